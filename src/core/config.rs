use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub persistence: PersistenceBackend,
    pub swagger: SwaggerConfig,
    pub minio: MinIOConfig,
    pub sync: SyncConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

/// Where canonical report state lives
#[derive(Debug, Clone)]
pub enum PersistenceBackend {
    Postgres(DatabaseConfig),
    /// Process-local store, for development without a database
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for report media
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Public endpoint URL for publicly accessible files (optional, defaults to endpoint)
    pub public_endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Bucket name for storing files
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Prefix for public files (e.g., "public")
    pub public_prefix: String,
}

/// Optimistic synchronization settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long an optimistic override may stay unconfirmed before it is
    /// dropped and surfaced as a sync timeout
    pub grace_period: Duration,
    /// Capacity of the notification broadcast channel
    pub notification_buffer: usize,
    /// Optional cap on the number of reports in the live subscription
    pub subscription_limit: Option<i64>,
}

/// Media validation limits
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub max_upload_size_mb: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            persistence: PersistenceBackend::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            minio: MinIOConfig::from_env()?,
            sync: SyncConfig::from_env()?,
            media: MediaConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 12 * 1024 * 1024; // 12MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PersistenceBackend {
    pub fn from_env() -> Result<Self, String> {
        let backend = env::var("PERSISTENCE_BACKEND").unwrap_or_else(|_| "postgres".to_string());

        match backend.to_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres(DatabaseConfig::from_env()?)),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "PERSISTENCE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            )),
        }
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "CivicSync API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Report lifecycle and triage API for CivicSync".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl MinIOConfig {
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        // Public endpoint defaults to the main endpoint if not specified
        let public_endpoint =
            env::var("MINIO_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "civicsync-media".to_string());

        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let public_prefix =
            env::var("MINIO_PUBLIC_PREFIX").unwrap_or_else(|_| "public".to_string());

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            public_prefix,
        })
    }
}

impl SyncConfig {
    const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;
    const DEFAULT_NOTIFICATION_BUFFER: usize = 256;

    pub fn from_env() -> Result<Self, String> {
        let grace_period_secs = env::var("SYNC_GRACE_PERIOD_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_GRACE_PERIOD_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "SYNC_GRACE_PERIOD_SECS must be a valid number".to_string())?;

        if grace_period_secs == 0 {
            return Err("SYNC_GRACE_PERIOD_SECS must be greater than zero".to_string());
        }

        let notification_buffer = env::var("NOTIFICATION_BUFFER")
            .unwrap_or_else(|_| Self::DEFAULT_NOTIFICATION_BUFFER.to_string())
            .parse::<usize>()
            .map_err(|_| "NOTIFICATION_BUFFER must be a valid number".to_string())?;

        let subscription_limit = match env::var("SUBSCRIPTION_LIMIT") {
            Ok(raw) if !raw.is_empty() => Some(
                raw.parse::<i64>()
                    .map_err(|_| "SUBSCRIPTION_LIMIT must be a valid number".to_string())?,
            ),
            _ => None,
        };

        Ok(Self {
            grace_period: Duration::from_secs(grace_period_secs),
            notification_buffer: notification_buffer.max(1),
            subscription_limit,
        })
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(Self::DEFAULT_GRACE_PERIOD_SECS),
            notification_buffer: Self::DEFAULT_NOTIFICATION_BUFFER,
            subscription_limit: None,
        }
    }
}

impl MediaConfig {
    const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 10;

    pub fn from_env() -> Result<Self, String> {
        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<u64>()
            .map_err(|_| "MAX_UPLOAD_SIZE_MB must be a valid number".to_string())?;

        Ok(Self { max_upload_size_mb })
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        (self.max_upload_size_mb * 1024 * 1024) as usize
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: Self::DEFAULT_MAX_UPLOAD_SIZE_MB,
        }
    }
}
