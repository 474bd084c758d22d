//! Media store contract for report evidence and attachments

use async_trait::async_trait;

use crate::core::error::Result;

/// Allowed MIME types for report photos
pub const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Allowed MIME types for voice notes
pub const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/m4a",
    "audio/aac",
];

/// A file received from a client, held in memory until uploaded
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl MediaFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_audio(&self) -> bool {
        self.content_type.starts_with("audio/")
    }

    /// Object extension, from the content type first and the file name second
    pub fn extension(&self) -> &str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" => "wav",
            "audio/m4a" => "m4a",
            "audio/aac" => "aac",
            _ => self
                .file_name
                .rsplit_once('.')
                .map(|(_, ext)| ext)
                .filter(|ext| !ext.is_empty())
                .unwrap_or("bin"),
        }
    }
}

/// Result of checking a file before upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl MediaValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Folder a file is stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Images,
    Audio,
    Resolutions,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Images => "images",
            MediaFolder::Audio => "audio",
            MediaFolder::Resolutions => "resolutions",
        }
    }
}

/// Check size and type of a file.
///
/// Images and audio must be one of the allowed types. Other content types
/// are only size-checked.
pub fn validate_media(file: &MediaFile, max_size_mb: u64) -> MediaValidation {
    let max_size_bytes = max_size_mb.saturating_mul(1024 * 1024);
    if file.size() as u64 > max_size_bytes {
        return MediaValidation::rejected(format!("File size exceeds {}MB limit", max_size_mb));
    }

    if file.is_image() && !ALLOWED_IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return MediaValidation::rejected("Invalid image format. Allowed: JPEG, PNG, GIF, WebP");
    }

    if file.is_audio() && !ALLOWED_AUDIO_TYPES.contains(&file.content_type.as_str()) {
        return MediaValidation::rejected("Invalid audio format. Allowed: MP3, WAV, M4A, AAC");
    }

    MediaValidation::ok()
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    fn validate(&self, file: &MediaFile, max_size_mb: u64) -> MediaValidation {
        validate_media(file, max_size_mb)
    }

    /// Store a file and return its public URL.
    ///
    /// `Ok(None)` means the store accepted the request but produced no URL;
    /// callers treat it like a failed upload.
    async fn upload(&self, file: &MediaFile, folder: MediaFolder) -> Result<Option<String>>;
}
