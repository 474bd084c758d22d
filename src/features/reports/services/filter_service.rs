use crate::core::error::{AppError, Result};
use crate::features::reports::models::{Report, ReportPriority, ReportStatus};

/// Visible-list criteria. `None` filters mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportQuery {
    pub search: String,
    pub status: Option<ReportStatus>,
    pub priority: Option<ReportPriority>,
}

impl ReportQuery {
    /// Build a query from the raw `all | <value>` strings used by list filters
    pub fn parse(
        search: Option<&str>,
        status: Option<&str>,
        priority: Option<&str>,
    ) -> Result<Self> {
        let status = match status.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse::<ReportStatus>().map_err(AppError::BadRequest)?),
        };

        let priority = match priority.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some("low") => Some(ReportPriority::Low),
            Some("medium") => Some(ReportPriority::Medium),
            Some("high") => Some(ReportPriority::High),
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "unknown priority filter '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            search: search.unwrap_or_default().to_string(),
            status,
            priority,
        })
    }

    fn matches(&self, report: &Report, needle: &str) -> bool {
        let matches_search = needle.is_empty() || report.matches_search(needle);
        let matches_status = self.status.map_or(true, |s| report.status == s);
        let matches_priority = self.priority.map_or(true, |p| report.priority == p);

        matches_search && matches_status && matches_priority
    }
}

/// Filter `reports` (already in effective form) and move resolved ones to the end.
///
/// The partition is stable: within the active group and within the resolved
/// group the input order is kept.
pub fn filter_and_sort(reports: &[Report], query: &ReportQuery) -> Vec<Report> {
    let needle = query.search.to_lowercase();

    let (active, resolved): (Vec<&Report>, Vec<&Report>) = reports
        .iter()
        .filter(|r| query.matches(r, &needle))
        .partition(|r| r.status != ReportStatus::Resolved);

    active.into_iter().chain(resolved).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reports::models::fixtures::report;

    fn ids(reports: &[Report]) -> Vec<&str> {
        reports.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_resolved_sorted_last() {
        let input = vec![
            report("A", ReportStatus::Resolved),
            report("B", ReportStatus::Pending),
            report("C", ReportStatus::InProgress),
        ];

        let out = filter_and_sort(&input, &ReportQuery::default());
        assert_eq!(ids(&out), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_partition_is_stable() {
        let input = vec![
            report("r1", ReportStatus::Resolved),
            report("p1", ReportStatus::Pending),
            report("r2", ReportStatus::Resolved),
            report("i1", ReportStatus::InProgress),
            report("p2", ReportStatus::Pending),
        ];

        let out = filter_and_sort(&input, &ReportQuery::default());
        assert_eq!(ids(&out), vec!["p1", "i1", "p2", "r1", "r2"]);

        let first_resolved = out
            .iter()
            .position(|r| r.status == ReportStatus::Resolved)
            .unwrap();
        assert!(out[first_resolved..]
            .iter()
            .all(|r| r.status == ReportStatus::Resolved));
    }

    #[test]
    fn test_priority_filter_keeps_order() {
        let mut high_a = report("h1", ReportStatus::Pending);
        high_a.priority = ReportPriority::High;
        let mut medium = report("m1", ReportStatus::Pending);
        medium.priority = ReportPriority::Medium;
        let mut low = report("l1", ReportStatus::InProgress);
        low.priority = ReportPriority::Low;
        let mut high_b = report("h2", ReportStatus::InProgress);
        high_b.priority = ReportPriority::High;

        let input = vec![high_a, medium, low, high_b];
        let query = ReportQuery::parse(Some(""), Some("all"), Some("high")).unwrap();

        let out = filter_and_sort(&input, &query);
        assert_eq!(ids(&out), vec!["h1", "h2"]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let mut by_description = report("x1", ReportStatus::Pending);
        by_description.description = "Deep POTHOLE near school".to_string();
        let mut by_submitter = report("x2", ReportStatus::Pending);
        by_submitter.submitted_by = Some("Ravi Pothole-Hunter".to_string());
        let by_id = report("pothole-99", ReportStatus::Pending);
        let mut unrelated = report("x3", ReportStatus::Pending);
        unrelated.submitted_by = None;

        let input = vec![by_description, by_submitter, by_id, unrelated];
        let query = ReportQuery::parse(Some("pothole"), None, None).unwrap();

        let out = filter_and_sort(&input, &query);
        assert_eq!(ids(&out), vec!["x1", "x2", "pothole-99"]);
    }

    #[test]
    fn test_whitespace_search_is_literal() {
        let mut spaced = report("s1", ReportStatus::Pending);
        spaced.description = "Broken  bench".to_string();
        let input = vec![spaced, report("s2", ReportStatus::Pending)];

        // Fixture descriptions hold one space, so only the double-spaced one matches
        let query = ReportQuery::parse(Some("  "), None, None).unwrap();
        let out = filter_and_sort(&input, &query);
        assert_eq!(ids(&out), vec!["s1"]);

        let padded = ReportQuery::parse(Some(" bench "), None, None).unwrap();
        assert!(filter_and_sort(&input, &padded).is_empty());
    }

    #[test]
    fn test_status_filter() {
        let input = vec![
            report("a", ReportStatus::Pending),
            report("b", ReportStatus::InProgress),
            report("c", ReportStatus::Resolved),
        ];
        let query = ReportQuery::parse(None, Some("inProgress"), None).unwrap();
        assert_eq!(ids(&filter_and_sort(&input, &query)), vec!["b"]);
    }

    #[test]
    fn test_parse_rejects_unknown_filters() {
        assert!(ReportQuery::parse(None, Some("closed"), None).is_err());
        assert!(ReportQuery::parse(None, None, Some("urgent")).is_err());
    }
}
