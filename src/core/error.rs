use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid media: {0}")]
    InvalidMedia(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    #[error("Report already resolved: {0}")]
    AlreadyResolved(String),

    #[error("Sync timeout: {0}")]
    SyncTimeout(String),

    #[error("Resolution cancelled: {0}")]
    ResolutionCancelled(String),
}

impl AppError {
    /// Stable machine-readable kind, shared by HTTP bodies and the notification stream
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::InvalidMedia(_) => "invalid_media",
            AppError::UploadFailed(_) => "upload_failed",
            AppError::MutationFailed(_) => "mutation_failed",
            AppError::AlreadyResolved(_) => "already_resolved",
            AppError::SyncTimeout(_) => "sync_timeout",
            AppError::ResolutionCancelled(_) => "resolution_cancelled",
        }
    }

    /// Whether this failure belongs to the report lifecycle taxonomy and
    /// should be surfaced on the notification stream
    pub fn is_lifecycle_failure(&self) -> bool {
        matches!(
            self,
            AppError::InvalidTransition(_)
                | AppError::InvalidMedia(_)
                | AppError::UploadFailed(_)
                | AppError::MutationFailed(_)
                | AppError::AlreadyResolved(_)
                | AppError::SyncTimeout(_)
                | AppError::ResolutionCancelled(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::InvalidTransition(ref msg) | AppError::AlreadyResolved(ref msg) => (
                StatusCode::CONFLICT,
                self.to_string(),
                Some(vec![msg.clone()]),
            ),
            AppError::InvalidMedia(ref msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                self.to_string(),
                Some(vec![msg.clone()]),
            ),
            AppError::UploadFailed(ref msg) | AppError::MutationFailed(ref msg) => {
                tracing::error!("{}: {}", self.kind(), msg);
                (StatusCode::BAD_GATEWAY, self.to_string(), None)
            }
            AppError::SyncTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string(), None),
            AppError::ResolutionCancelled(_) => (StatusCode::CONFLICT, self.to_string(), None),
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
