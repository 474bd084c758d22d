use chrono::{Datelike, Months, NaiveDate};

use crate::features::reports::dtos::{AnalyticsDto, DistributionEntryDto, MonthlyCountDto};
use crate::features::reports::models::{Report, ReportPriority, ReportStatus};

const MONTHS_SHOWN: u32 = 6;

fn entry(name: &str, value: usize) -> DistributionEntryDto {
    DistributionEntryDto {
        name: name.to_string(),
        value,
    }
}

/// Summarize `reports` for the dashboard, with the monthly window ending at `today`
pub fn compute_analytics(reports: &[Report], today: NaiveDate) -> AnalyticsDto {
    let count_status = |s: ReportStatus| reports.iter().filter(|r| r.status == s).count();
    let count_priority = |p: ReportPriority| reports.iter().filter(|r| r.priority == p).count();

    let pending = count_status(ReportStatus::Pending);
    let in_progress = count_status(ReportStatus::InProgress);
    let resolved = count_status(ReportStatus::Resolved);

    let this_month = today.with_day(1).unwrap_or(today);
    let monthly = (0..MONTHS_SHOWN)
        .rev()
        .filter_map(|back| this_month.checked_sub_months(Months::new(back)))
        .map(|start| {
            let reports = reports
                .iter()
                .filter(|r| {
                    let created = r.created_at.date_naive();
                    created.year() == start.year() && created.month() == start.month()
                })
                .count();

            MonthlyCountDto {
                month: start.format("%Y-%m").to_string(),
                label: start.format("%b").to_string(),
                reports,
            }
        })
        .collect();

    AnalyticsDto {
        total_reports: reports.len(),
        pending_reports: pending,
        in_progress_reports: in_progress,
        resolved_reports: resolved,
        priority_distribution: vec![
            entry("Low", count_priority(ReportPriority::Low)),
            entry("Medium", count_priority(ReportPriority::Medium)),
            entry("High", count_priority(ReportPriority::High)),
        ],
        status_distribution: vec![
            entry("Pending", pending),
            entry("In Progress", in_progress),
            entry("Resolved", resolved),
        ],
        monthly,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::features::reports::models::fixtures::report;

    fn created(id: &str, status: ReportStatus, y: i32, m: u32, d: u32) -> Report {
        let mut r = report(id, status);
        r.created_at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        r
    }

    #[test]
    fn test_totals_and_distributions() {
        let mut high = report("c", ReportStatus::Resolved);
        high.priority = ReportPriority::High;
        let reports = vec![
            report("a", ReportStatus::Pending),
            report("b", ReportStatus::InProgress),
            high,
        ];

        let analytics = compute_analytics(&reports, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());

        assert_eq!(analytics.total_reports, 3);
        assert_eq!(analytics.pending_reports, 1);
        assert_eq!(analytics.in_progress_reports, 1);
        assert_eq!(analytics.resolved_reports, 1);
        assert_eq!(analytics.priority_distribution[1], entry("Medium", 2));
        assert_eq!(analytics.priority_distribution[2], entry("High", 1));
        assert_eq!(analytics.status_distribution[1], entry("In Progress", 1));
    }

    #[test]
    fn test_monthly_window_crosses_year_boundary() {
        let reports = vec![
            created("old", ReportStatus::Pending, 2024, 7, 31),
            created("aug", ReportStatus::Pending, 2024, 8, 1),
            created("dec1", ReportStatus::Pending, 2024, 12, 5),
            created("dec2", ReportStatus::Resolved, 2024, 12, 28),
            created("jan", ReportStatus::InProgress, 2025, 1, 2),
        ];

        let analytics = compute_analytics(&reports, NaiveDate::from_ymd_opt(2025, 1, 31).unwrap());

        let months: Vec<&str> = analytics.monthly.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(
            months,
            vec!["2024-08", "2024-09", "2024-10", "2024-11", "2024-12", "2025-01"]
        );
        let counts: Vec<usize> = analytics.monthly.iter().map(|m| m.reports).collect();
        assert_eq!(counts, vec![1, 0, 0, 0, 2, 1]);
        assert_eq!(analytics.monthly[0].label, "Aug");
    }
}
