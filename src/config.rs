/// Configuration management for Poolside CMS
use crate::error::{CmsError, CmsResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub sales: SalesConfig,
    pub imaging: ImagingConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub public_url: String,
    pub version: String,
    /// Maximum multipart upload body in bytes
    pub upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub blobstore: BlobstoreConfig,
}

/// Blob storage strategy, chosen once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BlobstoreConfig {
    Disk {
        location: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
        prefix: String,
    },
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    /// Seeded into an empty admin table at startup
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
    /// Inbox that receives lead notifications
    pub contact_receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesConfig {
    pub tax_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingConfig {
    /// Concurrent transcodes allowed on the blocking pool
    pub transcode_concurrency: usize,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub lead_submissions_per_minute: u32,
}

/// Logging configuration
///
/// `level` is an `EnvFilter` directive string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

pub const DEFAULT_TAX_RATE: f64 = 0.0625;
const DEFAULT_UPLOAD_LIMIT: usize = 100 * 1024 * 1024;

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> CmsResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CMS_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("CMS_PORT")
            .unwrap_or_else(|_| "4000".to_string())
            .parse()
            .map_err(|_| CmsError::Validation("Invalid port number".to_string()))?;
        let public_url =
            env::var("CMS_PUBLIC_URL").unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let version = env::var("CMS_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let upload_limit = parse_or("CMS_UPLOAD_LIMIT", DEFAULT_UPLOAD_LIMIT);

        let data_directory: PathBuf = env::var("CMS_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("CMS_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("cms.sqlite"));

        let blobstore = if let Ok(bucket) = env::var("CMS_BLOBSTORE_S3_BUCKET") {
            BlobstoreConfig::S3 {
                bucket,
                region: env::var("CMS_BLOBSTORE_S3_REGION")
                    .unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: env::var("CMS_BLOBSTORE_S3_ACCESS_KEY_ID")
                    .map_err(|_| CmsError::Validation("S3 access key required".to_string()))?,
                secret_access_key: env::var("CMS_BLOBSTORE_S3_SECRET_ACCESS_KEY")
                    .map_err(|_| CmsError::Validation("S3 secret key required".to_string()))?,
                endpoint: env::var("CMS_BLOBSTORE_S3_ENDPOINT").ok(),
                prefix: env::var("CMS_BLOBSTORE_S3_PREFIX").unwrap_or_else(|_| "media/".to_string()),
            }
        } else {
            BlobstoreConfig::Disk {
                location: env::var("CMS_BLOBSTORE_DISK_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("uploads")),
            }
        };

        let jwt_secret = env::var("CMS_JWT_SECRET")
            .map_err(|_| CmsError::Validation("JWT secret required".to_string()))?;
        let session_ttl_hours = parse_or("CMS_SESSION_TTL_HOURS", 24);

        let bootstrap_admin = match (env::var("CMS_ADMIN_EMAIL"), env::var("CMS_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: env::var("CMS_ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
            }),
            _ => None,
        };

        let email = if let Ok(smtp_url) = env::var("CMS_EMAIL_SMTP_URL") {
            let from_address = env::var("CMS_EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| format!("noreply@{}", hostname));
            Some(EmailConfig {
                smtp_url,
                contact_receiver: env::var("CMS_CONTACT_RECEIVER")
                    .unwrap_or_else(|_| from_address.clone()),
                from_address,
            })
        } else {
            None
        };

        let tax_rate = parse_or("CMS_TAX_RATE", DEFAULT_TAX_RATE);
        let transcode_concurrency = parse_or("CMS_TRANSCODE_CONCURRENCY", 2);

        let rate_limit_enabled = parse_or("CMS_RATE_LIMIT_ENABLED", true);
        let lead_submissions_per_minute = parse_or("CMS_LEAD_SUBMISSIONS_PER_MINUTE", 10);

        let log_level = env::var("RUST_LOG")
            .unwrap_or_else(|_| "poolside_cms=debug,tower_http=debug".to_string());
        let log_json = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                version,
                upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                database,
                blobstore,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_hours,
                bootstrap_admin,
            },
            email,
            sales: SalesConfig { tax_rate },
            imaging: ImagingConfig {
                transcode_concurrency,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                lead_submissions_per_minute,
            },
            logging: LoggingConfig {
                level: log_level,
                json: log_json,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> CmsResult<()> {
        if self.service.hostname.is_empty() {
            return Err(CmsError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(CmsError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if !self.sales.tax_rate.is_finite() || self.sales.tax_rate < 0.0 {
            return Err(CmsError::Validation(
                "Tax rate must be a non-negative number".to_string(),
            ));
        }

        if self.imaging.transcode_concurrency == 0 {
            return Err(CmsError::Validation(
                "Transcode concurrency must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests: in-memory friendly defaults rooted at `dir`
    #[cfg(test)]
    pub fn for_tests(dir: &std::path::Path) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                public_url: "http://localhost".to_string(),
                version: "test".to_string(),
                upload_limit: DEFAULT_UPLOAD_LIMIT,
            },
            storage: StorageConfig {
                data_directory: dir.to_path_buf(),
                database: dir.join("cms.sqlite"),
                blobstore: BlobstoreConfig::Disk {
                    location: dir.join("uploads"),
                },
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-at-least-32-characters".to_string(),
                session_ttl_hours: 1,
                bootstrap_admin: None,
            },
            email: None,
            sales: SalesConfig {
                tax_rate: DEFAULT_TAX_RATE,
            },
            imaging: ImagingConfig {
                transcode_concurrency: 2,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                lead_submissions_per_minute: 10,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
