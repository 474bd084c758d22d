mod analytics_service;
mod assignment_service;
mod filter_service;
mod report_service;
mod resolution_service;
mod state_machine;
mod sync_cache;

pub use analytics_service::compute_analytics;
pub use assignment_service::DepartmentAssignmentPolicy;
pub use filter_service::{filter_and_sort, ReportQuery};
pub use report_service::ReportService;
pub use resolution_service::MediaGatedResolutionWorkflow;
pub use state_machine::{ReportEvent, ReportStateMachine, Transition};
pub use sync_cache::{OptimisticSyncCache, Override, ReconcileOutcome, SharedSyncCache};
