use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::features::reports::handlers::{self, ReportState};
use crate::features::reports::services::ReportService;

/// Multipart framing allowance on top of the photo itself
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Create routes for the reports feature
pub fn routes(report_service: Arc<ReportService>, max_upload_size_bytes: usize) -> Router {
    let state = ReportState { report_service };

    Router::new()
        .route(
            "/api/reports",
            get(handlers::list_reports).post(handlers::create_report),
        )
        .route(
            "/api/reports/notifications",
            get(handlers::notifications_stream),
        )
        .route("/api/reports/analytics", get(handlers::get_analytics))
        .route("/api/reports/{id}", get(handlers::get_report))
        .route(
            "/api/reports/{id}/status",
            patch(handlers::update_report_status),
        )
        .route(
            "/api/reports/{id}/department",
            put(handlers::assign_department),
        )
        .route(
            "/api/reports/{id}/resolution",
            post(handlers::resolve_report)
                .delete(handlers::cancel_resolution)
                .layer(DefaultBodyLimit::max(
                    max_upload_size_bytes + MULTIPART_OVERHEAD_BYTES,
                )),
        )
        .route("/api/departments", get(handlers::list_departments))
        .with_state(state)
}
