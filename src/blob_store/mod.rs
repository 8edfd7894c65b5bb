/// Blob Storage System
///
/// Holds the binary rendition data behind media assets. Two interchangeable
/// strategies exist: a local directory tree and an S3-compatible content store.
/// The active backend is built once at startup and shared through `AppContext`.
pub mod disk;
pub mod s3;

#[cfg(test)]
pub mod memory;

pub use disk::DiskBlobBackend;
pub use s3::{S3BlobBackend, S3Config};

use crate::{
    config::BlobstoreConfig,
    error::{CmsError, CmsResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use uuid::Uuid;

/// Storage key of one rendition: `{asset_id}/{file_name}`
///
/// The asset id groups every rendition of an upload so a whole asset can be
/// removed at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BlobKey {
    asset_id: Uuid,
    file_name: String,
}

impl BlobKey {
    pub fn new(asset_id: Uuid, stem: &str, extension: &str) -> CmsResult<Self> {
        let file_name = format!("{}.{}", stem, extension);
        if !is_valid_file_name(&file_name) {
            return Err(CmsError::Validation(format!(
                "Invalid rendition file name: {}",
                file_name
            )));
        }
        Ok(Self {
            asset_id,
            file_name,
        })
    }

    pub fn parse(raw: &str) -> CmsResult<Self> {
        let invalid = || CmsError::Validation(format!("Malformed image reference: {}", raw));

        let (id, file_name) = raw.trim_start_matches('/').split_once('/').ok_or_else(invalid)?;
        let asset_id = Uuid::parse_str(id).map_err(|_| invalid())?;
        if !is_valid_file_name(file_name) {
            return Err(invalid());
        }

        Ok(Self {
            asset_id,
            file_name: file_name.to_string(),
        })
    }

    pub fn asset_id(&self) -> Uuid {
        self.asset_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or_default()
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for_extension(self.extension())
    }
}

fn is_valid_file_name(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-';
    !stem.is_empty()
        && !ext.is_empty()
        && stem.chars().all(allowed)
        && ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_id, self.file_name)
    }
}

impl FromStr for BlobKey {
    type Err = CmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for BlobKey {
    type Error = CmsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.to_string()
    }
}

/// Metadata written alongside a blob
#[derive(Debug, Clone)]
pub struct BlobMeta {
    pub original_name: String,
    pub content_type: String,
    /// Logical size tier (thumbnail, medium, large, favicon)
    pub size_tag: String,
}

/// Blob bytes as read back from a backend
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// All blobs stored under one asset id
#[derive(Debug, Clone)]
pub struct BlobGroup {
    pub asset_id: Uuid,
    pub last_modified: DateTime<Utc>,
}

/// Blob storage backend trait
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store a blob under `key`, replacing any previous content
    async fn put(&self, key: &BlobKey, data: Vec<u8>, meta: &BlobMeta) -> CmsResult<()>;

    /// Retrieve a blob; `None` when nothing is stored under `key`
    async fn get(&self, key: &BlobKey) -> CmsResult<Option<StoredBlob>>;

    /// Delete a blob. Deleting a missing blob succeeds.
    async fn delete(&self, key: &BlobKey) -> CmsResult<()>;

    async fn exists(&self, key: &BlobKey) -> CmsResult<bool>;

    /// Delete every blob stored for an asset
    async fn delete_group(&self, asset_id: Uuid) -> CmsResult<()>;

    /// Enumerate asset groups, used by the orphan sweep
    async fn list_groups(&self) -> CmsResult<Vec<BlobGroup>>;
}

/// Build the configured backend
pub async fn create_backend(config: &BlobstoreConfig) -> CmsResult<Arc<dyn BlobBackend>> {
    match config {
        BlobstoreConfig::Disk { location } => {
            tokio::fs::create_dir_all(location).await?;
            tracing::info!("Using disk blob storage at {:?}", location);
            Ok(Arc::new(DiskBlobBackend::new(location.clone())))
        }
        BlobstoreConfig::S3 {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
            prefix,
        } => {
            let backend = S3BlobBackend::new(S3Config {
                bucket: bucket.clone(),
                region: region.clone(),
                endpoint: endpoint.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                prefix: prefix.clone(),
            })
            .await?;
            Ok(Arc::new(backend))
        }
    }
}

/// MIME type for a stored rendition extension
pub fn content_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trips_through_display() {
        let id = Uuid::new_v4();
        let key = BlobKey::new(id, "thumbnail", "jpg").unwrap();
        assert_eq!(key.to_string(), format!("{}/thumbnail.jpg", id));
        assert_eq!(BlobKey::parse(&key.to_string()).unwrap(), key);
        assert_eq!(key.content_type(), "image/jpeg");
    }

    #[test]
    fn test_parse_rejects_traversal_and_garbage() {
        let id = Uuid::new_v4();
        assert!(BlobKey::parse("not-a-uuid/thumbnail.jpg").is_err());
        assert!(BlobKey::parse(&format!("{}/../etc.passwd", id)).is_err());
        assert!(BlobKey::parse(&format!("{}/a/b.jpg", id)).is_err());
        assert!(BlobKey::parse(&format!("{}/noext", id)).is_err());
        assert!(BlobKey::parse(&format!("{}/UPPER.JPG", id)).is_err());
        assert!(BlobKey::parse("").is_err());
    }

    #[test]
    fn test_parse_accepts_leading_slash() {
        let id = Uuid::new_v4();
        let key = BlobKey::parse(&format!("/{}/original.svg", id)).unwrap();
        assert_eq!(key.asset_id(), id);
        assert_eq!(key.content_type(), "image/svg+xml");
    }

    #[test]
    fn test_key_serializes_as_string() {
        let id = Uuid::new_v4();
        let key = BlobKey::new(id, "large", "png").unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}/large.png\"", id));
        let back: BlobKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
