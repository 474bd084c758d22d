use utoipa::{Modify, OpenApi};

use crate::features::media::{dtos as media_dtos, handlers as media_handlers};
use crate::features::reports::{
    dtos as reports_dtos, handlers as reports_handlers, models as reports_models,
};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Reports
        reports_handlers::list_reports,
        reports_handlers::create_report,
        reports_handlers::get_report,
        reports_handlers::update_report_status,
        reports_handlers::assign_department,
        reports_handlers::resolve_report,
        reports_handlers::cancel_resolution,
        reports_handlers::notifications_stream,
        reports_handlers::get_analytics,
        reports_handlers::list_departments,
        // Media
        media_handlers::upload_media,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Reports
            reports_models::ReportStatus,
            reports_models::ReportPriority,
            reports_models::Department,
            reports_models::ReportTag,
            reports_models::Coordinates,
            reports_models::Report,
            reports_dtos::CreateReportDto,
            reports_dtos::UpdateReportStatusDto,
            reports_dtos::AssignDepartmentDto,
            reports_dtos::ResolveReportDto,
            reports_dtos::CancelResolutionResponseDto,
            reports_dtos::TransientState,
            reports_dtos::ReportListItemDto,
            reports_dtos::DepartmentDto,
            reports_dtos::NotificationSeverity,
            reports_dtos::SyncNotification,
            reports_dtos::DistributionEntryDto,
            reports_dtos::MonthlyCountDto,
            reports_dtos::AnalyticsDto,
            ApiResponse<reports_models::Report>,
            ApiResponse<reports_dtos::ReportListItemDto>,
            ApiResponse<Vec<reports_dtos::ReportListItemDto>>,
            ApiResponse<reports_dtos::CancelResolutionResponseDto>,
            ApiResponse<Vec<reports_dtos::DepartmentDto>>,
            ApiResponse<reports_dtos::AnalyticsDto>,
            // Media
            media_dtos::UploadMediaDto,
            media_dtos::MediaResponseDto,
            ApiResponse<media_dtos::MediaResponseDto>,
        )
    ),
    tags(
        (name = "reports", description = "Report lifecycle, triage and analytics"),
        (name = "media", description = "Report photo and voice note uploads"),
    ),
    info(
        title = "CivicSync API",
        version = "0.1.0",
        description = "API documentation for CivicSync",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_feature_paths() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Test".to_string(),
            version: "9.9.9".to_string(),
            description: "desc".to_string(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Test");
        for path in [
            "/api/reports",
            "/api/reports/{id}/resolution",
            "/api/reports/notifications",
            "/api/departments",
            "/api/media/upload",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
