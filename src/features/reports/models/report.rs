use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;

/// Lifecycle status of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Resolved)
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::InProgress => write!(f, "inProgress"),
            ReportStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "inProgress" => Ok(ReportStatus::InProgress),
            "resolved" => Ok(ReportStatus::Resolved),
            other => Err(format!("unknown report status '{}'", other)),
        }
    }
}

/// Report priority, fixed at submission
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "report_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for ReportPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportPriority::Low => write!(f, "low"),
            ReportPriority::Medium => write!(f, "medium"),
            ReportPriority::High => write!(f, "high"),
        }
    }
}

/// Departments a report can be handed off to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "department", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Pwd,
    Electricity,
    Water,
    Municipality,
    Sanitation,
    Transport,
}

impl Department {
    pub const ALL: [Department; 6] = [
        Department::Pwd,
        Department::Electricity,
        Department::Water,
        Department::Municipality,
        Department::Sanitation,
        Department::Transport,
    ];

    /// Human readable department name
    pub fn display_name(self) -> &'static str {
        match self {
            Department::Pwd => "Public Works Department (PWD)",
            Department::Electricity => "Electricity Department",
            Department::Water => "Water Department",
            Department::Municipality => "Municipality",
            Department::Sanitation => "Sanitation Department",
            Department::Transport => "Transport Department",
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Department::Pwd => write!(f, "pwd"),
            Department::Electricity => write!(f, "electricity"),
            Department::Water => write!(f, "water"),
            Department::Municipality => write!(f, "municipality"),
            Department::Sanitation => write!(f, "sanitation"),
            Department::Transport => write!(f, "transport"),
        }
    }
}

/// Fixed tag vocabulary offered at submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ReportTag {
    Pothole,
    #[serde(rename = "Water Leak")]
    WaterLeak,
    #[serde(rename = "Gas Issue")]
    GasIssue,
    #[serde(rename = "Street Light")]
    StreetLight,
    #[serde(rename = "Blocked Drain")]
    BlockedDrain,
    #[serde(rename = "Noise Complaint")]
    NoiseComplaint,
    #[serde(rename = "Illegal Dumping")]
    IllegalDumping,
    #[serde(rename = "Public Safety")]
    PublicSafety,
    #[serde(rename = "Traffic Signal")]
    TrafficSignal,
    #[serde(rename = "Road Maintenance")]
    RoadMaintenance,
    Others,
}

impl ReportTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportTag::Pothole => "Pothole",
            ReportTag::WaterLeak => "Water Leak",
            ReportTag::GasIssue => "Gas Issue",
            ReportTag::StreetLight => "Street Light",
            ReportTag::BlockedDrain => "Blocked Drain",
            ReportTag::NoiseComplaint => "Noise Complaint",
            ReportTag::IllegalDumping => "Illegal Dumping",
            ReportTag::PublicSafety => "Public Safety",
            ReportTag::TrafficSignal => "Traffic Signal",
            ReportTag::RoadMaintenance => "Road Maintenance",
            ReportTag::Others => "Others",
        }
    }
}

impl std::str::FromStr for ReportTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s {
            "Pothole" => ReportTag::Pothole,
            "Water Leak" => ReportTag::WaterLeak,
            "Gas Issue" => ReportTag::GasIssue,
            "Street Light" => ReportTag::StreetLight,
            "Blocked Drain" => ReportTag::BlockedDrain,
            "Noise Complaint" => ReportTag::NoiseComplaint,
            "Illegal Dumping" => ReportTag::IllegalDumping,
            "Public Safety" => ReportTag::PublicSafety,
            "Traffic Signal" => ReportTag::TrafficSignal,
            "Road Maintenance" => ReportTag::RoadMaintenance,
            "Others" => ReportTag::Others,
            other => return Err(format!("unknown tag '{}'", other)),
        };
        Ok(tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Canonical report record as stored by the persistence collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub description: String,
    pub location: String,
    pub tags: Vec<ReportTag>,
    pub image_refs: Vec<String>,
    pub audio_ref: Option<String>,
    pub priority: ReportPriority,
    pub status: ReportStatus,
    pub assigned_department: Option<Department>,
    pub resolved_image_ref: Option<String>,
    pub submitted_by: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    /// Check the record-level invariants of a report
    ///
    /// - `resolved_image_ref` is present if and only if the report is resolved
    /// - an assigned department implies the report has left `pending`
    pub fn check_invariants(&self) -> Result<(), String> {
        match (self.status, self.resolved_image_ref.as_deref()) {
            (ReportStatus::Resolved, None) | (ReportStatus::Resolved, Some("")) => {
                return Err(format!(
                    "report {} is resolved without a resolution photo",
                    self.id
                ));
            }
            (ReportStatus::Pending | ReportStatus::InProgress, Some(_)) => {
                return Err(format!(
                    "report {} carries a resolution photo but is {}",
                    self.id, self.status
                ));
            }
            _ => {}
        }

        if self.assigned_department.is_some() && self.status == ReportStatus::Pending {
            return Err(format!(
                "report {} has a department but is still pending",
                self.id
            ));
        }

        Ok(())
    }

    /// Whether `needle` (already lowercased) appears in the searchable text fields
    pub fn matches_search(&self, needle: &str) -> bool {
        self.description.to_lowercase().contains(needle)
            || self.id.to_lowercase().contains(needle)
            || self
                .submitted_by
                .as_deref()
                .map(|s| s.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

/// Data for submitting a new report
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub user_id: String,
    pub description: String,
    pub location: String,
    pub tags: Vec<ReportTag>,
    pub image_refs: Vec<String>,
    pub audio_ref: Option<String>,
    pub priority: ReportPriority,
    pub submitted_by: Option<String>,
    pub coordinates: Option<Coordinates>,
}

impl ReportDraft {
    /// Materialize the draft as a freshly created report.
    /// New reports always start pending, unassigned and without a resolution photo.
    pub fn into_report(self, id: String, now: DateTime<Utc>) -> Report {
        Report {
            id,
            user_id: self.user_id,
            description: self.description,
            location: self.location,
            tags: self.tags,
            image_refs: self.image_refs,
            audio_ref: self.audio_ref,
            priority: self.priority,
            status: ReportStatus::Pending,
            assigned_department: None,
            resolved_image_ref: None,
            submitted_by: self.submitted_by,
            coordinates: self.coordinates,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of the mutable lifecycle fields of a report.
///
/// Used both as the body of an optimistic override and as the atomic
/// mutation sent to persistence, so fields that must change together
/// always travel together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_department: Option<Department>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_image_ref: Option<String>,
}

impl ReportPatch {
    pub fn status(status: ReportStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn assignment(department: Department) -> Self {
        Self {
            status: Some(ReportStatus::InProgress),
            assigned_department: Some(department),
            resolved_image_ref: None,
        }
    }

    pub fn resolution(photo_ref: String) -> Self {
        Self {
            status: Some(ReportStatus::Resolved),
            assigned_department: None,
            resolved_image_ref: Some(photo_ref),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_department.is_none()
            && self.resolved_image_ref.is_none()
    }

    /// Shallow-merge the patch onto a report
    pub fn apply_to(&self, report: &mut Report) {
        if let Some(status) = self.status {
            report.status = status;
        }
        if let Some(department) = self.assigned_department {
            report.assigned_department = Some(department);
        }
        if let Some(ref photo) = self.resolved_image_ref {
            report.resolved_image_ref = Some(photo.clone());
        }
    }

    /// Whether every field carried by the patch already holds in `report`
    pub fn is_reflected_in(&self, report: &Report) -> bool {
        self.status.map_or(true, |s| report.status == s)
            && self
                .assigned_department
                .map_or(true, |d| report.assigned_department == Some(d))
            && self
                .resolved_image_ref
                .as_ref()
                .map_or(true, |p| report.resolved_image_ref.as_ref() == Some(p))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn report(id: &str, status: ReportStatus) -> Report {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let (assigned_department, resolved_image_ref) = match status {
            ReportStatus::Pending => (None, None),
            ReportStatus::InProgress => (Some(Department::Pwd), None),
            ReportStatus::Resolved => (None, Some(format!("https://media.test/{id}.jpg"))),
        };

        Report {
            id: id.to_string(),
            user_id: "citizen-1".to_string(),
            description: format!("Issue {id}"),
            location: "Main Street".to_string(),
            tags: vec![ReportTag::Pothole],
            image_refs: vec![],
            audio_ref: None,
            priority: ReportPriority::Medium,
            status,
            assigned_department,
            resolved_image_ref,
            submitted_by: Some("Asha".to_string()),
            coordinates: None,
            created_at,
            updated_at: created_at,
        }
    }
}
