use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ReportFilter, ReportStore, ReportSubscription, SNAPSHOT_BUFFER};
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportDraft, ReportPatch};

/// Process-local report store.
///
/// Holds the full set newest first inside a `watch` channel so every write
/// wakes the subscription feeders.
pub struct MemoryReportStore {
    reports: watch::Sender<Vec<Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        let (reports, _) = watch::channel(Vec::new());
        Self { reports }
    }

    /// Seed the store with existing reports (kept newest first)
    pub fn with_reports(mut reports: Vec<Report>) -> Self {
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let (reports, _) = watch::channel(reports);
        Self { reports }
    }

    /// Number of live subscription feeders
    pub fn subscriber_count(&self) -> usize {
        self.reports.receiver_count()
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, draft: &ReportDraft) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let report = draft.clone().into_report(id.clone(), Utc::now());

        self.reports.send_modify(|reports| reports.insert(0, report));

        info!("Created report {} in memory store", id);
        Ok(id)
    }

    async fn subscribe(&self, filter: &ReportFilter) -> Result<ReportSubscription> {
        let mut changes = self.reports.subscribe();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let filter = filter.clone();

        let feeder = tokio::spawn(async move {
            loop {
                let snapshot = filter.select(&changes.borrow_and_update());
                if tx.send(snapshot).await.is_err() {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
            debug!("Memory store subscription feeder stopped");
        });

        Ok(ReportSubscription::new(rx, feeder))
    }

    async fn mutate(&self, id: &str, patch: &ReportPatch) -> Result<()> {
        let mut found = false;

        self.reports.send_if_modified(|reports| {
            let Some(report) = reports.iter_mut().find(|r| r.id == id) else {
                return false;
            };
            patch.apply_to(report);
            // Keep per-report timestamps strictly increasing
            report.updated_at = Utc::now().max(report.updated_at + chrono::Duration::microseconds(1));
            found = true;
            true
        });

        if !found {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }

        debug!("Mutated report {} in memory store: {:?}", id, patch);
        Ok(())
    }

    async fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        Ok(filter.select(&self.reports.borrow()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::fixtures::report;
    use crate::features::reports::models::{Department, ReportPriority, ReportStatus, ReportTag};

    fn draft(user: &str, priority: ReportPriority) -> ReportDraft {
        ReportDraft {
            user_id: user.to_string(),
            description: "Overflowing drain".to_string(),
            location: "Market Road".to_string(),
            tags: vec![ReportTag::BlockedDrain],
            image_refs: vec![],
            audio_ref: None,
            priority,
            submitted_by: Some("Meera".to_string()),
            coordinates: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_query_newest_first() {
        let store = MemoryReportStore::new();
        let first = store
            .create(&draft("u1", ReportPriority::Low))
            .await
            .unwrap();
        let second = store
            .create(&draft("u2", ReportPriority::High))
            .await
            .unwrap();

        let all = store.query(&ReportFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second);
        assert_eq!(all[1].id, first);
        assert!(all.iter().all(|r| r.status == ReportStatus::Pending));

        let high_only = store
            .query(&ReportFilter {
                priority: Some(ReportPriority::High),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(high_only.len(), 1);
        assert_eq!(high_only[0].id, second);
    }

    #[tokio::test]
    async fn test_mutate_is_atomic_and_bumps_updated_at() {
        let store = MemoryReportStore::with_reports(vec![report("r1", ReportStatus::Pending)]);
        let before = store.query(&ReportFilter::default()).await.unwrap()[0].clone();

        store
            .mutate("r1", &ReportPatch::assignment(Department::Water))
            .await
            .unwrap();

        let after = store.query(&ReportFilter::default()).await.unwrap()[0].clone();
        assert_eq!(after.status, ReportStatus::InProgress);
        assert_eq!(after.assigned_department, Some(Department::Water));
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn test_mutate_unknown_report() {
        let store = MemoryReportStore::new();
        let err = store
            .mutate("missing", &ReportPatch::status(ReportStatus::InProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_subscription_delivers_current_then_changes() {
        let store = MemoryReportStore::with_reports(vec![report("r1", ReportStatus::Pending)]);
        let mut subscription = store.subscribe(&ReportFilter::default()).await.unwrap();

        let initial = subscription.next_snapshot().await.unwrap();
        assert_eq!(initial[0].status, ReportStatus::Pending);

        store
            .mutate("r1", &ReportPatch::status(ReportStatus::InProgress))
            .await
            .unwrap();

        let next = subscription.next_snapshot().await.unwrap();
        assert_eq!(next[0].status, ReportStatus::InProgress);

        subscription.close();
        tokio::task::yield_now().await;
    }
}
