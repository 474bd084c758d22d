use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use validator::Validate;

use super::analytics_service::compute_analytics;
use super::assignment_service::DepartmentAssignmentPolicy;
use super::filter_service::{filter_and_sort, ReportQuery};
use super::resolution_service::MediaGatedResolutionWorkflow;
use super::state_machine::{ReportEvent, ReportStateMachine, Transition};
use super::sync_cache::{ReconcileOutcome, SharedSyncCache};
use crate::core::config::{MediaConfig, SyncConfig};
use crate::core::error::{AppError, Result};
use crate::features::reports::dtos::{
    AnalyticsDto, CreateReportDto, ReportListItemDto, SyncNotification, TransientState,
};
use crate::features::reports::models::{Department, Report, ReportDraft, ReportStatus};
use crate::features::reports::workers::SyncWorker;
use crate::modules::persistence::{ReportFilter, ReportStore};
use crate::modules::storage::{MediaFile, MediaStore};

/// Entry point for report intents and reads.
///
/// Owns the optimistic cache and the single live subscription that feeds it.
/// Every lifecycle failure returned to a caller is also published on the
/// notification stream.
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    cache: Arc<SharedSyncCache>,
    assignment: DepartmentAssignmentPolicy,
    resolution: MediaGatedResolutionWorkflow,
    notifications: broadcast::Sender<SyncNotification>,
    feed_filter: ReportFilter,
    sync_worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        media: Arc<dyn MediaStore>,
        sync: &SyncConfig,
        media_config: &MediaConfig,
    ) -> Self {
        let cache = Arc::new(SharedSyncCache::new(sync.grace_period));
        let (notifications, _) = broadcast::channel(sync.notification_buffer);

        Self {
            assignment: DepartmentAssignmentPolicy::new(cache.clone(), store.clone()),
            resolution: MediaGatedResolutionWorkflow::new(
                cache.clone(),
                store.clone(),
                media,
                media_config.max_upload_size_mb,
            ),
            store,
            cache,
            notifications,
            feed_filter: ReportFilter {
                limit: sync.subscription_limit,
                ..Default::default()
            },
            sync_worker: Mutex::new(None),
        }
    }

    pub fn sync_cache(&self) -> &SharedSyncCache {
        &self.cache
    }

    // =========================================================================
    // CANONICAL FEED
    // =========================================================================

    /// One-shot load of the canonical set, used before the live feed is attached
    pub async fn load(&self) -> Result<usize> {
        let reports = self.store.query(&self.feed_filter).await?;
        let count = reports.len();
        self.on_snapshot(reports).await;
        info!("Loaded {} reports", count);
        Ok(count)
    }

    /// Open a live subscription and start the worker that applies it.
    /// A previously attached subscription is closed first.
    pub async fn attach_subscription(self: &Arc<Self>) -> Result<()> {
        let subscription = self.store.subscribe(&self.feed_filter).await?;
        let worker = tokio::spawn(SyncWorker::new(self.clone(), subscription).run());

        let previous = self
            .sync_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(worker);
        if let Some(previous) = previous {
            previous.abort();
            debug!("Replaced previous report subscription");
        }

        info!("Report subscription attached");
        Ok(())
    }

    /// Close the live subscription, if any
    pub fn detach_subscription(&self) -> bool {
        let worker = self
            .sync_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match worker {
            Some(worker) => {
                worker.abort();
                info!("Report subscription detached");
                true
            }
            None => false,
        }
    }

    pub fn has_subscription(&self) -> bool {
        self.sync_worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    /// Apply a canonical snapshot and surface overrides that timed out
    pub async fn on_snapshot(&self, reports: Vec<Report>) -> ReconcileOutcome {
        let outcome = self
            .cache
            .write()
            .await
            .on_canonical_snapshot(reports, Instant::now());

        if !outcome.landed.is_empty() {
            debug!("Confirmed overrides: {:?}", outcome.landed);
        }
        self.publish_timeouts(&outcome.timed_out);
        outcome
    }

    /// Drop overrides that outlived the grace period
    pub async fn expire_overdue(&self) -> Vec<String> {
        let expired = self.cache.write().await.expire_overdue(Instant::now());
        self.publish_timeouts(&expired);
        expired
    }

    pub async fn next_deadline(&self) -> Option<Instant> {
        self.cache.read().await.next_deadline()
    }

    fn publish_timeouts(&self, ids: &[String]) {
        for id in ids {
            warn!(
                "Change to report {} was not confirmed in time; showing last known state",
                id
            );
            self.publish(SyncNotification::from_error(
                id,
                &AppError::SyncTimeout(format!("Change to report {} was not confirmed", id)),
            ));
        }
    }

    // =========================================================================
    // INTENTS
    // =========================================================================

    pub async fn set_status(&self, id: &str, status: ReportStatus) -> Result<ReportListItemDto> {
        let result = self.apply_status(id, status).await;
        self.finish(id, result).await
    }

    async fn apply_status(&self, id: &str, status: ReportStatus) -> Result<()> {
        let current = self.effective_or_not_found(id).await?;

        match ReportStateMachine::transition(&current, &ReportEvent::SetStatus(status))? {
            Transition::Noop => {
                debug!("Report {} already {}", id, status);
                Ok(())
            }
            Transition::Apply(patch) => {
                self.cache.commit(self.store.as_ref(), id, patch).await?;
                info!("Report {} moved to {}", id, status);
                Ok(())
            }
        }
    }

    pub async fn assign_department(
        &self,
        id: &str,
        department: Department,
    ) -> Result<ReportListItemDto> {
        let result = self.assignment.assign(id, department).await.map(|_| ());
        self.finish(id, result).await
    }

    pub async fn resolve_with_photo(
        &self,
        id: &str,
        photo: Option<MediaFile>,
    ) -> Result<ReportListItemDto> {
        let result = self.resolution.resolve(id, photo).await.map(|_| ());
        self.finish(id, result).await
    }

    /// Abandon an in-flight resolution. Returns whether one was in flight.
    pub async fn cancel_resolution(&self, id: &str) -> bool {
        self.resolution.cancel(id).await
    }

    /// Validate and persist a new report
    pub async fn submit(&self, dto: CreateReportDto) -> Result<Report> {
        dto.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let draft = ReportDraft::from(dto);
        let id = self.store.create(&draft).await?;

        let stored = self
            .store
            .query(&ReportFilter {
                user_id: Some(draft.user_id.clone()),
                ..Default::default()
            })
            .await?
            .into_iter()
            .find(|r| r.id == id);

        match stored {
            Some(report) => Ok(report),
            None => {
                warn!("Report {} not readable right after creation", id);
                Err(AppError::Internal(format!(
                    "Report {} was created but could not be read back",
                    id
                )))
            }
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Effective, filtered and sorted view of the current report set
    pub async fn list(&self, query: &ReportQuery) -> Vec<ReportListItemDto> {
        let cache = self.cache.read().await;
        let committing = self.resolution.committing_ids();

        filter_and_sort(&cache.effective_reports(), query)
            .into_iter()
            .map(|report| ReportListItemDto {
                transient: TransientState {
                    committing: committing.contains(&report.id),
                    pending_sync: cache.has_override(&report.id),
                },
                report,
            })
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<ReportListItemDto> {
        let cache = self.cache.read().await;
        let report = cache
            .effective(id)
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        Ok(ReportListItemDto {
            transient: TransientState {
                committing: self.resolution.is_committing(id),
                pending_sync: cache.has_override(id),
            },
            report,
        })
    }

    pub async fn analytics(&self, today: NaiveDate) -> AnalyticsDto {
        let reports = self.cache.read().await.effective_reports();
        compute_analytics(&reports, today)
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    async fn effective_or_not_found(&self, id: &str) -> Result<Report> {
        self.cache
            .effective(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))
    }

    /// Publish a failed intent, or return the report's current list item
    async fn finish(&self, id: &str, result: Result<()>) -> Result<ReportListItemDto> {
        if let Err(e) = result {
            if e.is_lifecycle_failure() {
                self.publish(SyncNotification::from_error(id, &e));
            }
            return Err(e);
        }
        self.get(id).await
    }

    fn publish(&self, notification: SyncNotification) {
        // No receivers is fine; nobody is watching
        if self.notifications.send(notification).is_err() {
            debug!("No notification subscribers");
        }
    }
}
