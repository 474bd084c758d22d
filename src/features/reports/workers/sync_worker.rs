use std::sync::Arc;

use tokio::time::{sleep_until, Instant};

use crate::features::reports::services::ReportService;
use crate::modules::persistence::ReportSubscription;

/// Applies canonical snapshots in arrival order and expires overrides when
/// their grace period ends.
///
/// Sleeps until the earliest override deadline instead of polling, and wakes
/// early whenever a new override is applied.
pub struct SyncWorker {
    service: Arc<ReportService>,
    subscription: ReportSubscription,
}

impl SyncWorker {
    pub fn new(service: Arc<ReportService>, subscription: ReportSubscription) -> Self {
        Self {
            service,
            subscription,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("Starting report sync worker");

        loop {
            let deadline = self.service.next_deadline().await;
            let overrides_changed = self.service.sync_cache().overrides_changed();

            tokio::select! {
                snapshot = self.subscription.next_snapshot() => match snapshot {
                    Some(reports) => {
                        tracing::debug!("Applying snapshot of {} reports", reports.len());
                        self.service.on_snapshot(reports).await;
                    }
                    None => {
                        tracing::warn!("Report feed ended; sync worker stopping");
                        break;
                    }
                },
                _ = wait_for(deadline) => {
                    self.service.expire_overdue().await;
                }
                _ = overrides_changed => {
                    // Re-arm with the new earliest deadline
                }
            }
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::config::{MediaConfig, SyncConfig};
    use crate::features::reports::dtos::NotificationSeverity;
    use crate::features::reports::models::fixtures::report;
    use crate::features::reports::models::{Department, ReportStatus};
    use crate::shared::test_helpers::{MutationMode, RecordingStore, StubMediaStore, UploadOutcome};

    const GRACE: Duration = Duration::from_secs(30);

    async fn running_service(store: Arc<RecordingStore>) -> Arc<ReportService> {
        let service = Arc::new(ReportService::new(
            store,
            Arc::new(StubMediaStore::returning(UploadOutcome::NoUrl)),
            &SyncConfig {
                grace_period: GRACE,
                ..SyncConfig::default()
            },
            &MediaConfig::default(),
        ));
        service.load().await.unwrap();
        service.attach_subscription().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_applied_write_is_confirmed_by_feed() {
        let store = Arc::new(RecordingStore::with_reports(vec![report(
            "r1",
            ReportStatus::Pending,
        )]));
        let service = running_service(store.clone()).await;

        service
            .assign_department("r1", Department::Transport)
            .await
            .unwrap();

        let confirmed = tokio::time::timeout(Duration::from_secs(5), async {
            while service.get("r1").await.unwrap().transient.pending_sync {
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(confirmed.is_ok());

        let item = service.get("r1").await.unwrap();
        assert_eq!(item.report.status, ReportStatus::InProgress);
        assert_eq!(item.report.assigned_department, Some(Department::Transport));
        service.detach_subscription();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_unconfirmed_override() {
        let store = Arc::new(RecordingStore::with_reports(vec![report(
            "r1",
            ReportStatus::Pending,
        )]));
        store.set_mode(MutationMode::Swallow);
        let service = running_service(store.clone()).await;
        let mut notifications = service.subscribe_notifications();

        let applied_at = Instant::now();
        service
            .set_status("r1", ReportStatus::InProgress)
            .await
            .unwrap();

        let notification = notifications.recv().await.unwrap();

        assert_eq!(notification.kind, "sync_timeout");
        assert_eq!(notification.severity, NotificationSeverity::Warning);
        assert!(Instant::now() >= applied_at + GRACE);
        assert_eq!(
            service.get("r1").await.unwrap().report.status,
            ReportStatus::Pending
        );
        service.detach_subscription();
    }
}
