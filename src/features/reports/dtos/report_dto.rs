use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::core::error::AppError;
use crate::features::reports::models::{
    Coordinates, Department, Report, ReportDraft, ReportPriority, ReportStatus, ReportTag,
};

/// Request DTO for submitting a report
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportDto {
    /// Account of the submitting citizen
    #[validate(length(min = 1, max = 128, message = "userId must be 1-128 characters"))]
    pub user_id: String,

    #[validate(
        length(max = 5000, message = "Description must not exceed 5000 characters"),
        custom(function = "crate::shared::validation::not_blank")
    )]
    pub description: String,

    #[validate(
        length(max = 500, message = "Location must not exceed 500 characters"),
        custom(function = "crate::shared::validation::not_blank")
    )]
    pub location: String,

    #[serde(default)]
    #[validate(custom(function = "crate::shared::validation::unique_tags"))]
    pub tags: Vec<ReportTag>,

    /// URLs returned by `POST /api/media/upload`
    #[serde(default)]
    #[validate(
        length(max = 5, message = "At most 5 images can be attached"),
        custom(function = "crate::shared::validation::media_urls")
    )]
    pub image_refs: Vec<String>,

    #[validate(url(message = "audioRef must be a valid URL"))]
    pub audio_ref: Option<String>,

    #[serde(default)]
    pub priority: ReportPriority,

    #[validate(length(max = 128, message = "submittedBy must not exceed 128 characters"))]
    pub submitted_by: Option<String>,

    #[validate(custom(function = "crate::shared::validation::coordinates"))]
    pub coordinates: Option<Coordinates>,
}

impl From<CreateReportDto> for ReportDraft {
    fn from(dto: CreateReportDto) -> Self {
        Self {
            user_id: dto.user_id.trim().to_string(),
            description: dto.description.trim().to_string(),
            location: dto.location.trim().to_string(),
            tags: dto.tags,
            image_refs: dto.image_refs,
            audio_ref: dto.audio_ref,
            priority: dto.priority,
            submitted_by: dto
                .submitted_by
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            coordinates: dto.coordinates,
        }
    }
}

/// Request DTO for changing report status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateReportStatusDto {
    /// `pending` or `inProgress`; resolving goes through the resolution endpoint
    pub status: ReportStatus,
}

/// Request DTO for routing a report to a department
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignDepartmentDto {
    pub department: Department,
}

/// Resolution upload form for OpenAPI documentation.
/// The handler reads the multipart body directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ResolveReportDto {
    /// Photo showing the resolved issue
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub photo: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelResolutionResponseDto {
    /// Whether a resolution attempt was in flight
    pub cancelled: bool,
}

/// Query params for listing reports
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ReportListQuery {
    /// Case-insensitive text matched against description, id and submitter
    pub search: Option<String>,
    /// `all`, `pending`, `inProgress` or `resolved`
    pub status: Option<String>,
    /// `all`, `low`, `medium` or `high`
    pub priority: Option<String>,
}

/// Local state of a report that is not part of the record itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransientState {
    /// A resolution attempt is uploading or committing
    pub committing: bool,
    /// An optimistic change has not been confirmed yet
    pub pending_sync: bool,
}

/// A report as shown to staff: the effective record plus transient state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportListItemDto {
    #[serde(flatten)]
    pub report: Report,
    pub transient: TransientState,
}

/// Response DTO for the department catalogue
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DepartmentDto {
    pub id: Department,
    pub name: String,
}

impl From<Department> for DepartmentDto {
    fn from(d: Department) -> Self {
        Self {
            id: d,
            name: d.display_name().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Error,
}

/// A surfaced lifecycle failure, pushed to staff clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncNotification {
    pub report_id: String,
    /// Machine-readable failure kind, e.g. `sync_timeout`
    pub kind: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub created_at: DateTime<Utc>,
}

impl SyncNotification {
    pub fn from_error(report_id: &str, error: &AppError) -> Self {
        let severity = match error {
            AppError::MutationFailed(_) => NotificationSeverity::Error,
            AppError::InvalidTransition(_) | AppError::ResolutionCancelled(_) => {
                NotificationSeverity::Info
            }
            _ => NotificationSeverity::Warning,
        };

        Self {
            report_id: report_id.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            severity,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::faker::address::en::StreetName;
    use fake::faker::lorem::en::Sentence;
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn valid_dto() -> CreateReportDto {
        CreateReportDto {
            user_id: "citizen-42".to_string(),
            description: Sentence(3..8).fake(),
            location: StreetName().fake(),
            tags: vec![ReportTag::Pothole],
            image_refs: vec!["https://media.test/public/civicsync/images/a.jpg".to_string()],
            audio_ref: None,
            priority: ReportPriority::High,
            submitted_by: Some(Name().fake()),
            coordinates: Some(Coordinates {
                lat: 18.52,
                lng: 73.85,
            }),
        }
    }

    #[test]
    fn test_valid_submission() {
        assert!(valid_dto().validate().is_ok());
    }

    #[test]
    fn test_blank_description_rejected() {
        let dto = CreateReportDto {
            description: "   ".to_string(),
            ..valid_dto()
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("description"));
    }

    #[test]
    fn test_too_many_images_rejected() {
        let dto = CreateReportDto {
            image_refs: (0..6)
                .map(|i| format!("https://media.test/{}.jpg", i))
                .collect(),
            ..valid_dto()
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_unknown_tag_fails_to_parse() {
        let body = serde_json::json!({
            "userId": "u1",
            "description": "Broken pipe",
            "location": "Main St",
            "tags": ["Meteor Strike"]
        });
        assert!(serde_json::from_value::<CreateReportDto>(body).is_err());
    }

    #[test]
    fn test_draft_is_trimmed_and_defaults_priority() {
        let body = serde_json::json!({
            "userId": "u1",
            "description": "  Broken pipe  ",
            "location": " Main St ",
            "tags": ["Water Leak"],
            "submittedBy": "  "
        });
        let dto: CreateReportDto = serde_json::from_value(body).unwrap();
        let draft = ReportDraft::from(dto);

        assert_eq!(draft.description, "Broken pipe");
        assert_eq!(draft.location, "Main St");
        assert_eq!(draft.priority, ReportPriority::Medium);
        assert_eq!(draft.submitted_by, None);
        assert_eq!(draft.tags, vec![ReportTag::WaterLeak]);
    }

    #[test]
    fn test_notification_severity() {
        let failed = SyncNotification::from_error("r1", &AppError::MutationFailed("x".into()));
        assert_eq!(failed.severity, NotificationSeverity::Error);
        assert_eq!(failed.kind, "mutation_failed");

        let timeout = SyncNotification::from_error("r1", &AppError::SyncTimeout("x".into()));
        assert_eq!(timeout.severity, NotificationSeverity::Warning);
    }

    #[test]
    fn test_list_item_flattens_report() {
        let item = ReportListItemDto {
            report: crate::features::reports::models::fixtures::report("r1", ReportStatus::Pending),
            transient: TransientState {
                committing: true,
                pending_sync: false,
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "r1");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["transient"]["committing"], true);
    }
}
