use std::sync::Arc;

use tracing::info;

use super::state_machine::{ReportEvent, ReportStateMachine, Transition};
use super::sync_cache::SharedSyncCache;
use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Department, Report};
use crate::modules::persistence::ReportStore;

/// Routes a report to a department.
///
/// Department and `inProgress` status always travel as one override and one
/// mutation, so no reader sees one without the other. Concurrent assignments
/// from different staff members are last-writer-wins.
pub struct DepartmentAssignmentPolicy {
    cache: Arc<SharedSyncCache>,
    store: Arc<dyn ReportStore>,
}

impl DepartmentAssignmentPolicy {
    pub fn new(cache: Arc<SharedSyncCache>, store: Arc<dyn ReportStore>) -> Self {
        Self { cache, store }
    }

    pub async fn assign(&self, report_id: &str, department: Department) -> Result<Report> {
        let current = self
            .cache
            .effective(report_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;

        match ReportStateMachine::transition(&current, &ReportEvent::AssignDepartment(department))? {
            Transition::Noop => Ok(current),
            Transition::Apply(patch) => {
                self.cache
                    .commit(self.store.as_ref(), report_id, patch)
                    .await?;

                info!("Report {} assigned to {}", report_id, department);
                self.cache
                    .effective(report_id)
                    .await
                    .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::features::reports::models::fixtures::report;
    use crate::features::reports::models::ReportStatus;
    use crate::modules::persistence::ReportFilter;
    use crate::shared::test_helpers::{MutationMode, RecordingStore};

    async fn setup(status: ReportStatus) -> (DepartmentAssignmentPolicy, Arc<SharedSyncCache>, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::with_reports(vec![report("r1", status)]));
        let cache = Arc::new(SharedSyncCache::new(Duration::from_secs(30)));
        let snapshot = store.query(&ReportFilter::default()).await.unwrap();
        cache
            .write()
            .await
            .on_canonical_snapshot(snapshot, tokio::time::Instant::now());

        (
            DepartmentAssignmentPolicy::new(cache.clone(), store.clone()),
            cache,
            store,
        )
    }

    #[tokio::test]
    async fn test_assignment_is_one_compound_mutation() {
        let (policy, cache, store) = setup(ReportStatus::Pending).await;

        let assigned = policy.assign("r1", Department::Water).await.unwrap();

        assert_eq!(assigned.status, ReportStatus::InProgress);
        assert_eq!(assigned.assigned_department, Some(Department::Water));

        // Optimistic view carries both fields before any snapshot arrives
        let effective = cache.effective("r1").await.unwrap();
        assert_eq!(effective.status, ReportStatus::InProgress);
        assert_eq!(effective.assigned_department, Some(Department::Water));

        let mutations = store.mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].1.status, Some(ReportStatus::InProgress));
        assert_eq!(mutations[0].1.assigned_department, Some(Department::Water));

        let canonical = store.canonical("r1").await.unwrap();
        assert_eq!(canonical.status, ReportStatus::InProgress);
        assert_eq!(canonical.assigned_department, Some(Department::Water));
    }

    #[tokio::test]
    async fn test_reassigning_same_department_is_noop() {
        let (policy, _, store) = setup(ReportStatus::Pending).await;

        policy.assign("r1", Department::Pwd).await.unwrap();
        policy.assign("r1", Department::Pwd).await.unwrap();

        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let (policy, cache, store) = setup(ReportStatus::InProgress).await;

        policy.assign("r1", Department::Water).await.unwrap();
        policy.assign("r1", Department::Electricity).await.unwrap();

        assert_eq!(
            cache.effective("r1").await.unwrap().assigned_department,
            Some(Department::Electricity)
        );
        assert_eq!(
            store.canonical("r1").await.unwrap().assigned_department,
            Some(Department::Electricity)
        );
    }

    #[tokio::test]
    async fn test_resolved_report_cannot_be_assigned() {
        let (policy, _, store) = setup(ReportStatus::Resolved).await;

        let err = policy.assign("r1", Department::Water).await.unwrap_err();

        assert!(matches!(err, AppError::AlreadyResolved(_)));
        assert_eq!(store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_both_fields() {
        let (policy, cache, store) = setup(ReportStatus::Pending).await;
        store.set_mode(MutationMode::Fail);

        let err = policy.assign("r1", Department::Sanitation).await.unwrap_err();

        assert!(matches!(err, AppError::MutationFailed(_)));
        let effective = cache.effective("r1").await.unwrap();
        assert_eq!(effective.status, ReportStatus::Pending);
        assert_eq!(effective.assigned_department, None);
    }

    #[tokio::test]
    async fn test_unknown_report() {
        let (policy, _, _) = setup(ReportStatus::Pending).await;
        let err = policy.assign("nope", Department::Water).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
