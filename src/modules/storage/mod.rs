//! Storage module for report media
//!
//! Defines the media store contract and the MinIO/S3-compatible
//! implementation used in deployments.

mod media;
mod minio_client;

pub use media::{
    validate_media, MediaFile, MediaFolder, MediaStore, MediaValidation, ALLOWED_AUDIO_TYPES,
    ALLOWED_IMAGE_TYPES,
};
pub use minio_client::MinIOClient;
