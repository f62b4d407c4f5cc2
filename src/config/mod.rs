use crate::services::storage::chunked::DEFAULT_CHUNK_SIZE;
use std::env;
use std::str::FromStr;

/// Where file bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Chunks stored as rows in the application database.
    Database,
    /// Multipart objects in an S3-compatible bucket.
    S3,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "database" | "db" | "chunked" => Ok(Self::Database),
            "s3" | "minio" => Ok(Self::S3),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Connection settings for the S3 backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listening port (default: 5000)
    pub port: u16,

    /// Database connection string (default: local SQLite file)
    pub database_url: String,

    /// JWT signing secret
    pub jwt_secret: String,

    /// Let the server start with the built-in or an empty JWT secret
    /// (default: false, meant for local development only)
    pub allow_insecure_secret: bool,

    /// Lifetime of issued tokens in hours (default: 24)
    pub jwt_ttl_hours: i64,

    /// Backend holding the file bytes (default: database)
    pub storage_backend: StorageBackend,

    /// Bucket name for the S3 backend (default: "pdfs")
    pub bucket_name: String,

    /// Chunk size in bytes (default: 255 KB)
    pub chunk_size: usize,

    /// Maximum upload size in bytes (default: 50 MB)
    pub max_file_size: usize,

    /// Also require uploads to start with the PDF signature (default: false)
    pub verify_pdf_signature: bool,

    /// Only read when `storage_backend` is S3
    pub s3: Option<S3Settings>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            database_url: "sqlite://pdf_vault.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            allow_insecure_secret: false,
            jwt_ttl_hours: 24,
            storage_backend: StorageBackend::Database,
            bucket_name: "pdfs".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: 50 * 1024 * 1024, // 50 MB
            verify_pdf_signature: false,
            s3: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!("{}, falling back to database storage", e);
                default.storage_backend
            }),
            Err(_) => default.storage_backend,
        };

        let s3 = env::var("S3_ENDPOINT").ok().map(|endpoint| S3Settings {
            endpoint,
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("S3_SECRET_KEY").unwrap_or_default(),
        });

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            allow_insecure_secret: env::var("ALLOW_INSECURE_JWT_SECRET")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.allow_insecure_secret),

            jwt_ttl_hours: env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.jwt_ttl_hours),

            storage_backend,

            bucket_name: env::var("BUCKET_NAME").unwrap_or(default.bucket_name),

            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.chunk_size),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            verify_pdf_signature: env::var("VERIFY_PDF_SIGNATURE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.verify_pdf_signature),

            s3,
        }
    }

    /// Create config for development and tests (in-memory database, small chunks)
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "development-secret".to_string(),
            chunk_size: 16 * 1024,
            max_file_size: 8 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Whether the signing secret is still the built-in placeholder
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == Self::default().jwt_secret
    }

    /// Fails when tokens would be signed with a guessable secret, unless
    /// `ALLOW_INSECURE_JWT_SECRET` is set.
    pub fn check_jwt_secret(&self) -> anyhow::Result<()> {
        if !self.uses_default_secret() && !self.jwt_secret.is_empty() {
            return Ok(());
        }
        if self.allow_insecure_secret {
            tracing::warn!("⚠️  JWT_SECRET is not set, tokens are signed with an insecure secret");
            return Ok(());
        }
        anyhow::bail!(
            "JWT_SECRET is unset or uses the built-in placeholder; set it, or set ALLOW_INSECURE_JWT_SECRET=true for local development"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.chunk_size, 255 * 1024);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.storage_backend, StorageBackend::Database);
        assert!(!config.verify_pdf_signature);
        assert!(config.uses_default_secret());
        assert!(!config.allow_insecure_secret);
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(!config.uses_default_secret());
        assert!(config.check_jwt_secret().is_ok());
        assert_eq!(config.bucket_name, "pdfs");
    }

    #[test]
    fn test_placeholder_secret_is_refused() {
        let config = AppConfig::default();
        let err = config.check_jwt_secret().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let empty = AppConfig {
            jwt_secret: String::new(),
            ..AppConfig::default()
        };
        assert!(empty.check_jwt_secret().is_err());

        let allowed = AppConfig {
            allow_insecure_secret: true,
            ..AppConfig::default()
        };
        assert!(allowed.check_jwt_secret().is_ok());

        let configured = AppConfig {
            jwt_secret: "a-long-random-value".to_string(),
            ..AppConfig::default()
        };
        assert!(configured.check_jwt_secret().is_ok());
    }

    #[test]
    fn test_storage_backend_parsing() {
        assert_eq!("database".parse::<StorageBackend>(), Ok(StorageBackend::Database));
        assert_eq!(" S3 ".parse::<StorageBackend>(), Ok(StorageBackend::S3));
        assert_eq!("minio".parse::<StorageBackend>(), Ok(StorageBackend::S3));
        assert!("ftp".parse::<StorageBackend>().is_err());
    }
}
