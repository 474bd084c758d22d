use axum::{extract::DefaultBodyLimit, routing::post, Router};

use crate::features::media::handlers::{upload_media, MediaState};

/// Create routes for the media feature
pub fn routes(state: MediaState) -> Router {
    // Allow body size up to the upload limit + buffer for multipart overhead
    let body_limit = state.max_upload_size_bytes() + 1024 * 1024;

    Router::new()
        .route(
            "/api/media/upload",
            post(upload_media).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
