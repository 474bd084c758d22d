//! Persistence collaborator for canonical report state
//!
//! The store owns the canonical copy of every report. It assigns ids and
//! timestamps, applies partial updates atomically, and pushes full snapshots
//! of a filtered report set to subscribers.

mod memory;
mod postgres;

pub use memory::MemoryReportStore;
pub use postgres::PgReportStore;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::error::Result;
use crate::features::reports::models::{
    Report, ReportDraft, ReportPatch, ReportPriority, ReportStatus,
};

/// Buffer of undelivered snapshots per subscription
pub(crate) const SNAPSHOT_BUFFER: usize = 16;

/// Server-side filter applied to queries and subscriptions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub priority: Option<ReportPriority>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
}

impl ReportFilter {
    /// Whether a report passes the non-limit criteria
    pub fn matches(&self, report: &Report) -> bool {
        self.status.map_or(true, |s| report.status == s)
            && self.priority.map_or(true, |p| report.priority == p)
            && self
                .user_id
                .as_deref()
                .map_or(true, |u| report.user_id == u)
    }

    /// Apply the filter to a set already ordered newest first
    pub fn select(&self, reports: &[Report]) -> Vec<Report> {
        let limit = self
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        reports
            .iter()
            .filter(|r| self.matches(r))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// A live feed of canonical snapshots.
///
/// Snapshots arrive in the order the store produced them. Closing (or
/// dropping) the subscription stops the feed.
pub struct ReportSubscription {
    snapshots: mpsc::Receiver<Vec<Report>>,
    feeder: JoinHandle<()>,
}

impl ReportSubscription {
    pub fn new(snapshots: mpsc::Receiver<Vec<Report>>, feeder: JoinHandle<()>) -> Self {
        Self { snapshots, feeder }
    }

    /// Wait for the next snapshot. `None` once the feed has ended.
    pub async fn next_snapshot(&mut self) -> Option<Vec<Report>> {
        self.snapshots.recv().await
    }

    pub fn close(self) {
        // Drop does the work
    }
}

impl Drop for ReportSubscription {
    fn drop(&mut self) {
        self.feeder.abort();
    }
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new report and return its assigned id
    async fn create(&self, draft: &ReportDraft) -> Result<String>;

    /// Open a snapshot feed. The current state is delivered first.
    async fn subscribe(&self, filter: &ReportFilter) -> Result<ReportSubscription>;

    /// Atomically apply a partial update
    async fn mutate(&self, id: &str, patch: &ReportPatch) -> Result<()>;

    /// One-shot fetch, newest first
    async fn query(&self, filter: &ReportFilter) -> Result<Vec<Report>>;
}
