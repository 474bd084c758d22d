use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info};

use crate::core::config::MediaConfig;
use crate::core::error::{AppError, Result};
use crate::features::media::dtos::{MediaResponseDto, UploadMediaDto};
use crate::modules::storage::{MediaFile, MediaFolder, MediaStore};
use crate::shared::types::ApiResponse;

/// State for media handlers
#[derive(Clone)]
pub struct MediaState {
    pub media_store: Arc<dyn MediaStore>,
    pub config: MediaConfig,
}

impl MediaState {
    pub fn max_upload_size_bytes(&self) -> usize {
        self.config.max_upload_size_bytes()
    }
}

fn folder_for(file: &MediaFile, requested: Option<&str>) -> Result<MediaFolder> {
    match requested {
        Some("images") => Ok(MediaFolder::Images),
        Some("audio") => Ok(MediaFolder::Audio),
        Some(other) => Err(AppError::BadRequest(format!(
            "Unknown media folder '{}'. Allowed: images, audio",
            other
        ))),
        None if file.is_audio() => Ok(MediaFolder::Audio),
        None => Ok(MediaFolder::Images),
    }
}

/// Upload a report photo or voice note
///
/// Accepts multipart/form-data with:
/// - `file`: The file to upload (required)
/// - `folder`: "images" or "audio" (optional, inferred from the content type)
#[utoipa::path(
    post,
    path = "/api/media/upload",
    tag = "media",
    request_body(
        content = UploadMediaDto,
        content_type = "multipart/form-data",
        description = "Media upload form",
    ),
    responses(
        (status = 201, description = "File uploaded", body = ApiResponse<MediaResponseDto>),
        (status = 400, description = "Malformed form"),
        (status = 413, description = "File too large"),
        (status = 422, description = "File rejected by validation"),
        (status = 502, description = "Storage failed")
    )
)]
pub async fn upload_media(
    State(state): State<MediaState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<MediaResponseDto>>)> {
    let mut file: Option<MediaFile> = None;
    let mut folder: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unnamed".to_string());
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read file data: {}", e))
                })?;

                file = Some(MediaFile::new(file_name, content_type, data.to_vec()));
            }
            "folder" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read folder field: {}", e))
                })?;
                if !text.trim().is_empty() {
                    folder = Some(text.trim().to_lowercase());
                }
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let folder = folder_for(&file, folder.as_deref())?;

    let validation = state
        .media_store
        .validate(&file, state.config.max_upload_size_mb);
    if !validation.valid {
        return Err(AppError::InvalidMedia(
            validation
                .error
                .unwrap_or_else(|| "File rejected".to_string()),
        ));
    }

    let url = state
        .media_store
        .upload(&file, folder)
        .await?
        .ok_or_else(|| AppError::UploadFailed("Storage returned no URL".to_string()))?;

    info!("Media uploaded to {}: {}", folder.as_str(), url);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(MediaResponseDto {
                url,
                content_type: file.content_type,
                file_size: file.data.len(),
            }),
            None,
            None,
        )),
    ))
}
