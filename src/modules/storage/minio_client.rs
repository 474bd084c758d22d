//! MinIO/S3-compatible media store
//!
//! Report photos, voice notes and resolution evidence are written under the
//! public prefix so the returned URLs can be embedded directly in reports.
//!
//! Uses rust-s3 crate for lightweight S3 operations.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::media::{MediaFile, MediaFolder, MediaStore};
use crate::core::config::MinIOConfig;
use crate::core::error::AppError;

/// Namespace for every object this service writes
const MEDIA_NAMESPACE: &str = "civicsync";

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    public_endpoint: String,
    public_prefix: String,
}

impl MinIOClient {
    /// Create a new MinIO client from configuration and make sure the bucket exists.
    ///
    /// Anonymous read on `<public_prefix>/*` is expected to be granted on the
    /// bucket (`mc anonymous set download`).
    pub async fn new(config: MinIOConfig) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // Path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            public_endpoint: config.public_endpoint,
            public_prefix: config.public_prefix,
        };

        client.ensure_bucket_exists().await?;

        info!(
            "MinIO media store initialized for endpoint: {}, bucket: {}, public_prefix: {}",
            client.endpoint,
            client.bucket.name(),
            client.public_prefix
        );

        Ok(client)
    }

    /// Ensure the bucket exists, create if not
    pub async fn ensure_bucket_exists(&self) -> Result<(), AppError> {
        match self.create_bucket().await {
            Ok(_) => {
                info!("Bucket '{}' created successfully", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
                Ok(())
            }
        }
    }

    async fn create_bucket(&self) -> Result<(), AppError> {
        Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(|e| {
            AppError::Internal(format!(
                "Failed to create bucket '{}': {}",
                self.bucket.name(),
                e
            ))
        })?;

        Ok(())
    }

    /// Object key for a new file: `<public_prefix>/civicsync/<folder>/<uuid>.<ext>`
    pub fn generate_key(&self, folder: MediaFolder, extension: &str) -> String {
        format!(
            "{}/{}/{}/{}.{}",
            self.public_prefix,
            MEDIA_NAMESPACE,
            folder.as_str(),
            Uuid::now_v7(),
            extension
        )
    }

    /// Put raw bytes under `key`
    pub async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), AppError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| AppError::UploadFailed(format!("Failed to upload '{}': {}", key, e)))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(AppError::UploadFailed(format!(
                "Storage rejected '{}' with status {}",
                key, status
            )));
        }

        debug!("Uploaded '{}' to bucket '{}'", key, self.bucket.name());
        Ok(())
    }

    /// URL for a stored object. Public keys use the public endpoint.
    pub fn get_file_url(&self, key: &str) -> String {
        if key.starts_with(&format!("{}/", self.public_prefix)) {
            format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
        } else {
            format!("{}/{}/{}", self.endpoint, self.bucket.name(), key)
        }
    }
}

#[async_trait]
impl MediaStore for MinIOClient {
    async fn upload(
        &self,
        file: &MediaFile,
        folder: MediaFolder,
    ) -> Result<Option<String>, AppError> {
        let key = self.generate_key(folder, file.extension());

        if let Err(e) = self.put(&key, &file.data, &file.content_type).await {
            error!("Media upload of '{}' failed: {}", file.file_name, e);
            return Err(e);
        }

        let url = self.get_file_url(&key);
        info!(
            "Stored {} ({} bytes) as {}",
            file.file_name,
            file.size(),
            url
        );
        Ok(Some(url))
    }
}
