use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Upload form for OpenAPI documentation.
/// The handler reads the multipart body directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadMediaDto {
    /// Report photo or voice note
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// `images` or `audio`; inferred from the content type when omitted
    #[schema(example = "images")]
    pub folder: Option<String>,
}

/// Response DTO for an uploaded media file
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponseDto {
    /// Public URL to reference from a report
    pub url: String,
    pub content_type: String,
    pub file_size: usize,
}
