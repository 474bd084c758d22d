use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use chrono::Utc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::reports::dtos::{
    AnalyticsDto, AssignDepartmentDto, CancelResolutionResponseDto, CreateReportDto,
    DepartmentDto, ReportListItemDto, ReportListQuery, ResolveReportDto, SyncNotification,
    UpdateReportStatusDto,
};
use crate::features::reports::models::{Department, Report};
use crate::features::reports::services::{ReportQuery, ReportService};
use crate::modules::storage::MediaFile;
use crate::shared::constants::{SSE_KEEP_ALIVE_SECS, SSE_KEEP_ALIVE_TEXT};
use crate::shared::types::{ApiResponse, Meta};

/// State for report handlers
#[derive(Clone)]
pub struct ReportState {
    pub report_service: Arc<ReportService>,
}

/// List reports with optimistic changes applied, resolved last
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportListQuery),
    responses(
        (status = 200, description = "Filtered report list", body = ApiResponse<Vec<ReportListItemDto>>),
        (status = 400, description = "Unknown status or priority filter")
    ),
    tag = "reports"
)]
pub async fn list_reports(
    State(state): State<ReportState>,
    Query(params): Query<ReportListQuery>,
) -> Result<Json<ApiResponse<Vec<ReportListItemDto>>>> {
    let query = ReportQuery::parse(
        params.search.as_deref(),
        params.status.as_deref(),
        params.priority.as_deref(),
    )?;

    let items = state.report_service.list(&query).await;
    let total = items.len() as i64;

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

/// Submit a new report
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = CreateReportDto,
    responses(
        (status = 201, description = "Report created", body = ApiResponse<Report>),
        (status = 400, description = "Validation error")
    ),
    tag = "reports"
)]
pub async fn create_report(
    State(state): State<ReportState>,
    AppJson(dto): AppJson<CreateReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<Report>>)> {
    let report = state.report_service.submit(dto).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(report),
            Some("Report submitted".to_string()),
            None,
        )),
    ))
}

/// Get a single report
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "Report found", body = ApiResponse<ReportListItemDto>),
        (status = 404, description = "Report not found")
    ),
    tag = "reports"
)]
pub async fn get_report(
    State(state): State<ReportState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ReportListItemDto>>> {
    let item = state.report_service.get(&id).await?;
    Ok(Json(ApiResponse::success(Some(item), None, None)))
}

/// Move a report between pending and in progress
#[utoipa::path(
    patch,
    path = "/api/reports/{id}/status",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    request_body = UpdateReportStatusDto,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<ReportListItemDto>),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Transition not allowed"),
        (status = 502, description = "Change could not be saved")
    ),
    tag = "reports"
)]
pub async fn update_report_status(
    State(state): State<ReportState>,
    Path(id): Path<String>,
    AppJson(dto): AppJson<UpdateReportStatusDto>,
) -> Result<Json<ApiResponse<ReportListItemDto>>> {
    let item = state.report_service.set_status(&id, dto.status).await?;
    Ok(Json(ApiResponse::success(
        Some(item),
        Some("Status updated".to_string()),
        None,
    )))
}

/// Assign a department, which also moves the report to in progress
#[utoipa::path(
    put,
    path = "/api/reports/{id}/department",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    request_body = AssignDepartmentDto,
    responses(
        (status = 200, description = "Department assigned", body = ApiResponse<ReportListItemDto>),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Report already resolved"),
        (status = 502, description = "Change could not be saved")
    ),
    tag = "reports"
)]
pub async fn assign_department(
    State(state): State<ReportState>,
    Path(id): Path<String>,
    AppJson(dto): AppJson<AssignDepartmentDto>,
) -> Result<Json<ApiResponse<ReportListItemDto>>> {
    let item = state
        .report_service
        .assign_department(&id, dto.department)
        .await?;
    Ok(Json(ApiResponse::success(
        Some(item),
        Some(format!("Assigned to {}", dto.department.display_name())),
        None,
    )))
}

/// Resolve a report with a photo of the fix
///
/// Accepts multipart/form-data with a single `photo` file field.
#[utoipa::path(
    post,
    path = "/api/reports/{id}/resolution",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    request_body(
        content = ResolveReportDto,
        content_type = "multipart/form-data",
        description = "Resolution photo",
    ),
    responses(
        (status = 200, description = "Report resolved", body = ApiResponse<ReportListItemDto>),
        (status = 404, description = "Report not found"),
        (status = 409, description = "Report already resolved or attempt cancelled"),
        (status = 422, description = "Missing or invalid photo"),
        (status = 502, description = "Upload or save failed")
    ),
    tag = "reports"
)]
pub async fn resolve_report(
    State(state): State<ReportState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ReportListItemDto>>> {
    let mut photo: Option<MediaFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();
        if field_name != "photo" {
            debug!("Ignoring unknown field: {}", field_name);
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "resolution".to_string());
        let data = field.bytes().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read photo data: {}", e))
        })?;

        photo = Some(MediaFile::new(file_name, content_type, data.to_vec()));
    }

    let item = state.report_service.resolve_with_photo(&id, photo).await?;
    Ok(Json(ApiResponse::success(
        Some(item),
        Some("Report resolved".to_string()),
        None,
    )))
}

/// Cancel an in-flight resolution
#[utoipa::path(
    delete,
    path = "/api/reports/{id}/resolution",
    params(
        ("id" = String, Path, description = "Report ID")
    ),
    responses(
        (status = 200, description = "Cancellation recorded", body = ApiResponse<CancelResolutionResponseDto>)
    ),
    tag = "reports"
)]
pub async fn cancel_resolution(
    State(state): State<ReportState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<CancelResolutionResponseDto>> {
    let cancelled = state.report_service.cancel_resolution(&id).await;
    Json(ApiResponse::success(
        Some(CancelResolutionResponseDto { cancelled }),
        None,
        None,
    ))
}

/// Stream surfaced lifecycle failures
#[utoipa::path(
    get,
    path = "/api/reports/notifications",
    responses(
        (status = 200, description = "SSE stream of sync notifications", content_type = "text/event-stream", body = SyncNotification)
    ),
    tag = "reports"
)]
pub async fn notifications_stream(State(state): State<ReportState>) -> Response {
    let stream = BroadcastStream::new(state.report_service.subscribe_notifications()).filter_map(
        |received| match received {
            Ok(notification) => match Event::default()
                .event(notification.kind.clone())
                .json_data(&notification)
            {
                Ok(event) => Some(Ok::<_, Infallible>(event)),
                Err(e) => {
                    warn!("Failed to encode notification: {}", e);
                    None
                }
            },
            Err(e) => {
                // Slow client; skip what it missed
                warn!("Notification stream lagged: {}", e);
                None
            }
        },
    );

    Sse::new(stream)
        .keep_alive(
            axum::response::sse::KeepAlive::new()
                .interval(std::time::Duration::from_secs(SSE_KEEP_ALIVE_SECS))
                .text(SSE_KEEP_ALIVE_TEXT),
        )
        .into_response()
}

/// Dashboard analytics
#[utoipa::path(
    get,
    path = "/api/reports/analytics",
    responses(
        (status = 200, description = "Analytics over current reports", body = ApiResponse<AnalyticsDto>)
    ),
    tag = "reports"
)]
pub async fn get_analytics(State(state): State<ReportState>) -> Json<ApiResponse<AnalyticsDto>> {
    let analytics = state
        .report_service
        .analytics(Utc::now().date_naive())
        .await;
    Json(ApiResponse::success(Some(analytics), None, None))
}

/// Department catalogue
#[utoipa::path(
    get,
    path = "/api/departments",
    responses(
        (status = 200, description = "All departments", body = ApiResponse<Vec<DepartmentDto>>)
    ),
    tag = "reports"
)]
pub async fn list_departments() -> Json<ApiResponse<Vec<DepartmentDto>>> {
    let departments: Vec<DepartmentDto> = Department::ALL.into_iter().map(Into::into).collect();
    Json(ApiResponse::success(Some(departments), None, None))
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use super::*;
    use crate::core::config::{MediaConfig, SyncConfig};
    use crate::features::reports::models::fixtures::report;
    use crate::features::reports::models::ReportStatus;
    use crate::features::reports::routes;
    use crate::modules::persistence::{ReportFilter, ReportStore};
    use crate::shared::test_helpers::{RecordingStore, StubMediaStore, UploadOutcome};

    async fn server(reports: Vec<Report>) -> (TestServer, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::with_reports(reports));
        let media = Arc::new(StubMediaStore::returning(UploadOutcome::Url(
            "https://media.test/public/civicsync/resolutions/fixed.jpg".into(),
        )));
        let media_config = MediaConfig::default();
        let service = Arc::new(ReportService::new(
            store.clone(),
            media,
            &SyncConfig::default(),
            &media_config,
        ));
        service.load().await.unwrap();

        let app = routes(service, media_config.max_upload_size_bytes());
        (TestServer::new(app).unwrap(), store)
    }

    fn ids(body: &Value) -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_puts_resolved_last() {
        let (server, _) = server(vec![
            report("A", ReportStatus::Resolved),
            report("B", ReportStatus::Pending),
            report("C", ReportStatus::InProgress),
        ])
        .await;

        let response = server.get("/api/reports").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(ids(&body), vec!["B", "C", "A"]);
        assert_eq!(body["meta"]["total"], 3);
    }

    #[tokio::test]
    async fn test_list_filters_by_priority_and_rejects_unknown_status() {
        let mut high = report("H", ReportStatus::Pending);
        high.priority = crate::features::reports::models::ReportPriority::High;
        let (server, _) = server(vec![high, report("M", ReportStatus::Pending)]).await;

        let response = server
            .get("/api/reports")
            .add_query_param("priority", "high")
            .add_query_param("status", "all")
            .await;
        response.assert_status_ok();
        assert_eq!(ids(&response.json()), vec!["H"]);

        server
            .get("/api/reports")
            .add_query_param("status", "closed")
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_status_update_and_guard() {
        let (server, store) = server(vec![report("r1", ReportStatus::Pending)]).await;

        let response = server
            .patch("/api/reports/r1/status")
            .json(&json!({ "status": "inProgress" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "inProgress");

        server
            .patch("/api/reports/r1/status")
            .json(&json!({ "status": "resolved" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        assert_eq!(store.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_assign_department_sets_in_progress() {
        let (server, _) = server(vec![report("r1", ReportStatus::Pending)]).await;

        let response = server
            .put("/api/reports/r1/department")
            .json(&json!({ "department": "water" }))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["assignedDepartment"], "water");
        assert_eq!(body["data"]["status"], "inProgress");
    }

    #[tokio::test]
    async fn test_resolution_requires_photo() {
        let (server, store) = server(vec![report("r1", ReportStatus::InProgress)]).await;

        let missing = MultipartForm::new().add_text("note", "done");
        server
            .post("/api/reports/r1/resolution")
            .multipart(missing)
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.mutation_count(), 0);

        let with_photo = MultipartForm::new().add_part(
            "photo",
            Part::bytes(Bytes::from_static(&[0xFF, 0xD8, 0xFF]))
                .file_name("fixed.jpg")
                .mime_type("image/jpeg"),
        );
        let response = server
            .post("/api/reports/r1/resolution")
            .multipart(with_photo)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "resolved");
        assert_eq!(
            body["data"]["resolvedImageRef"],
            "https://media.test/public/civicsync/resolutions/fixed.jpg"
        );
        assert_eq!(body["data"]["transient"]["committing"], false);
    }

    #[tokio::test]
    async fn test_cancel_without_attempt() {
        let (server, _) = server(vec![report("r1", ReportStatus::Pending)]).await;

        let response = server.delete("/api/reports/r1/resolution").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["cancelled"], false);
    }

    #[tokio::test]
    async fn test_unknown_report_is_not_found() {
        let (server, _) = server(vec![]).await;
        server
            .get("/api/reports/missing")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_create_report() {
        let (server, store) = server(vec![]).await;

        let response = server
            .post("/api/reports")
            .json(&json!({
                "userId": "citizen-1",
                "description": "Pothole near the school gate",
                "location": "MG Road",
                "tags": ["Pothole"],
                "imageRefs": ["https://media.test/public/civicsync/images/p.jpg"],
                "priority": "high"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["priority"], "high");
        assert_eq!(
            store
                .query(&ReportFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_departments_and_analytics() {
        let (server, _) = server(vec![
            report("a", ReportStatus::Pending),
            report("b", ReportStatus::Resolved),
        ])
        .await;

        let departments: Value = server.get("/api/departments").await.json();
        assert_eq!(departments["data"].as_array().unwrap().len(), 6);
        assert_eq!(departments["data"][0]["id"], "pwd");

        let analytics: Value = server.get("/api/reports/analytics").await.json();
        assert_eq!(analytics["data"]["totalReports"], 2);
        assert_eq!(analytics["data"]["resolvedReports"], 1);
        assert_eq!(analytics["data"]["monthly"].as_array().unwrap().len(), 6);
    }
}
