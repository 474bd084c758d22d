use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One slice of a distribution chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DistributionEntryDto {
    pub name: String,
    pub value: usize,
}

/// Reports created in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyCountDto {
    /// `YYYY-MM`
    pub month: String,
    /// Short month name, e.g. `Mar`
    pub label: String,
    pub reports: usize,
}

/// Dashboard analytics over the effective report set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsDto {
    pub total_reports: usize,
    pub pending_reports: usize,
    pub in_progress_reports: usize,
    pub resolved_reports: usize,
    pub priority_distribution: Vec<DistributionEntryDto>,
    pub status_distribution: Vec<DistributionEntryDto>,
    /// Last six months, oldest first
    pub monthly: Vec<MonthlyCountDto>,
}
