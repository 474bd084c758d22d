//! Optimistic override layer over canonical report state.
//!
//! The canonical set is whatever the persistence collaborator last delivered,
//! kept in delivery order. Overrides are locally issued, not yet confirmed
//! patches keyed by report id. The effective view is canonical with the
//! override (if any) shallow-merged on top.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::futures::Notified;
use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportPatch};
use crate::modules::persistence::ReportStore;

/// A locally applied, unconfirmed patch
#[derive(Debug, Clone)]
pub struct Override {
    pub patch: ReportPatch,
    pub applied_at: Instant,
    /// Distinguishes successive overrides on the same report
    pub seq: u64,
}

/// What a reconciliation pass did to the override map
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Overrides dropped because canonical state now reflects them
    pub landed: Vec<String>,
    /// Overrides dropped because they outlived the grace period
    pub timed_out: Vec<String>,
}

pub struct OptimisticSyncCache {
    canonical: Vec<Report>,
    index: HashMap<String, usize>,
    overrides: HashMap<String, Override>,
    grace_period: Duration,
    next_seq: u64,
}

impl OptimisticSyncCache {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            canonical: Vec::new(),
            index: HashMap::new(),
            overrides: HashMap::new(),
            grace_period,
            next_seq: 0,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Insert or replace the override for `id`. Returns its sequence number,
    /// which is needed to roll back exactly this override later.
    pub fn apply_optimistic(&mut self, id: &str, patch: ReportPatch, now: Instant) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;

        if let Some(previous) = self.overrides.insert(
            id.to_string(),
            Override {
                patch,
                applied_at: now,
                seq,
            },
        ) {
            debug!(
                "Override {} on report {} replaced by {}",
                previous.seq, id, seq
            );
        }

        seq
    }

    /// Remove the override for `id` only if it is still the one identified by `seq`
    pub fn rollback(&mut self, id: &str, seq: u64) -> bool {
        match self.overrides.get(id) {
            Some(current) if current.seq == seq => {
                self.overrides.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Drop whatever override exists for `id`
    pub fn discard(&mut self, id: &str) -> Option<Override> {
        self.overrides.remove(id)
    }

    /// Replace the canonical set and reconcile overrides against it
    pub fn on_canonical_snapshot(&mut self, reports: Vec<Report>, now: Instant) -> ReconcileOutcome {
        for report in &reports {
            if let Some(previous) = self.canonical_report(&report.id) {
                if report.updated_at < previous.updated_at {
                    warn!(
                        "Canonical report {} went backwards in time ({} -> {}); applying as received",
                        report.id, previous.updated_at, report.updated_at
                    );
                }
            }
            if let Err(violation) = report.check_invariants() {
                warn!("Canonical snapshot violates report invariants: {}", violation);
            }
        }

        self.index = reports
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        self.canonical = reports;

        let mut landed: Vec<String> = self
            .overrides
            .iter()
            .filter(|(id, o)| {
                self.canonical_report(id)
                    .map(|r| o.patch.is_reflected_in(r))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        landed.sort();

        for id in &landed {
            self.overrides.remove(id);
        }

        ReconcileOutcome {
            landed,
            timed_out: self.expire_overdue(now),
        }
    }

    /// Drop overrides that are at least one grace period old. Returns their ids.
    pub fn expire_overdue(&mut self, now: Instant) -> Vec<String> {
        let grace_period = self.grace_period;
        let mut expired: Vec<String> = self
            .overrides
            .iter()
            .filter(|(_, o)| now.saturating_duration_since(o.applied_at) >= grace_period)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        for id in &expired {
            self.overrides.remove(id);
        }

        expired
    }

    /// The instant at which the oldest override expires
    pub fn next_deadline(&self) -> Option<Instant> {
        self.overrides
            .values()
            .map(|o| o.applied_at + self.grace_period)
            .min()
    }

    pub fn canonical_report(&self, id: &str) -> Option<&Report> {
        self.index.get(id).and_then(|&i| self.canonical.get(i))
    }

    pub fn has_override(&self, id: &str) -> bool {
        self.overrides.contains_key(id)
    }

    pub fn override_patch(&self, id: &str) -> Option<&ReportPatch> {
        self.overrides.get(id).map(|o| &o.patch)
    }

    pub fn pending_count(&self) -> usize {
        self.overrides.len()
    }

    /// Effective view of one report
    pub fn effective(&self, id: &str) -> Option<Report> {
        let mut report = self.canonical_report(id)?.clone();
        if let Some(o) = self.overrides.get(id) {
            o.patch.apply_to(&mut report);
        }
        Some(report)
    }

    /// Effective view of the whole set, in canonical order
    pub fn effective_reports(&self) -> Vec<Report> {
        self.canonical
            .iter()
            .map(|r| match self.overrides.get(&r.id) {
                Some(o) => {
                    let mut report = r.clone();
                    o.patch.apply_to(&mut report);
                    report
                }
                None => r.clone(),
            })
            .collect()
    }
}

/// The cache shared by intent dispatch and the sync worker.
///
/// Every new override wakes the worker so it can re-arm its deadline timer.
pub struct SharedSyncCache {
    inner: RwLock<OptimisticSyncCache>,
    overrides_changed: Notify,
}

impl SharedSyncCache {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            inner: RwLock::new(OptimisticSyncCache::new(grace_period)),
            overrides_changed: Notify::new(),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, OptimisticSyncCache> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, OptimisticSyncCache> {
        self.inner.write().await
    }

    /// Resolves once an override has been added since the last wake-up
    pub fn overrides_changed(&self) -> Notified<'_> {
        self.overrides_changed.notified()
    }

    pub async fn apply_optimistic(&self, id: &str, patch: ReportPatch) -> u64 {
        let seq = self
            .inner
            .write()
            .await
            .apply_optimistic(id, patch, Instant::now());
        self.overrides_changed.notify_one();
        seq
    }

    pub async fn rollback(&self, id: &str, seq: u64) -> bool {
        self.inner.write().await.rollback(id, seq)
    }

    pub async fn effective(&self, id: &str) -> Option<Report> {
        self.inner.read().await.effective(id)
    }

    /// Apply `patch` as an override, then write it through with a single
    /// `mutate`. A failed write rolls back exactly this override.
    pub async fn commit(&self, store: &dyn ReportStore, id: &str, patch: ReportPatch) -> Result<()> {
        self.commit_guarded(store, id, patch, |_| Ok(())).await
    }

    /// Like [`commit`](Self::commit), but `guard` runs under the write lock
    /// right before the override is applied. A guard error aborts the commit
    /// with nothing applied and nothing written.
    pub async fn commit_guarded<F>(
        &self,
        store: &dyn ReportStore,
        id: &str,
        patch: ReportPatch,
        guard: F,
    ) -> Result<()>
    where
        F: FnOnce(&OptimisticSyncCache) -> Result<()>,
    {
        let seq = {
            let mut cache = self.inner.write().await;
            guard(&cache)?;
            cache.apply_optimistic(id, patch.clone(), Instant::now())
        };
        self.overrides_changed.notify_one();

        if let Err(e) = store.mutate(id, &patch).await {
            let rolled_back = self.rollback(id, seq).await;
            error!(
                "Failed to persist {:?} for report {} (override rolled back: {}): {}",
                patch, id, rolled_back, e
            );
            return Err(AppError::MutationFailed(format!(
                "Could not save report {}: {}",
                id, e
            )));
        }

        Ok(())
    }
}
