/// Disk-based blob storage backend
use crate::{
    blob_store::{BlobBackend, BlobGroup, BlobKey, BlobMeta, StoredBlob},
    error::{CmsError, CmsResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// Disk storage backend
///
/// Stores each asset's renditions in their own directory named after the
/// asset id: `{base}/{asset_id}/{file_name}`.
#[derive(Clone)]
pub struct DiskBlobBackend {
    base_path: PathBuf,
}

impl DiskBlobBackend {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn group_path(&self, asset_id: Uuid) -> PathBuf {
        self.base_path.join(asset_id.to_string())
    }

    fn get_blob_path(&self, key: &BlobKey) -> PathBuf {
        self.group_path(key.asset_id()).join(key.file_name())
    }
}

#[async_trait]
impl BlobBackend for DiskBlobBackend {
    async fn put(&self, key: &BlobKey, data: Vec<u8>, _meta: &BlobMeta) -> CmsResult<()> {
        let group = self.group_path(key.asset_id());
        fs::create_dir_all(&group).await.map_err(|e| {
            CmsError::Storage(format!("Failed to create blob directory {:?}: {}", group, e))
        })?;

        fs::write(self.get_blob_path(key), data)
            .await
            .map_err(|e| CmsError::Storage(format!("Failed to write blob {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> CmsResult<Option<StoredBlob>> {
        match fs::read(self.get_blob_path(key)).await {
            Ok(data) => Ok(Some(StoredBlob {
                data,
                content_type: key.content_type().to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CmsError::Storage(format!(
                "Failed to read blob {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &BlobKey) -> CmsResult<()> {
        match fs::remove_file(self.get_blob_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CmsError::Storage(format!(
                "Failed to delete blob {}: {}",
                key, e
            ))),
        }
    }

    async fn exists(&self, key: &BlobKey) -> CmsResult<bool> {
        Ok(fs::try_exists(self.get_blob_path(key)).await.unwrap_or(false))
    }

    async fn delete_group(&self, asset_id: Uuid) -> CmsResult<()> {
        match fs::remove_dir_all(self.group_path(asset_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CmsError::Storage(format!(
                "Failed to delete blob directory for {}: {}",
                asset_id, e
            ))),
        }
    }

    async fn list_groups(&self) -> CmsResult<Vec<BlobGroup>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut groups = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(asset_id) = entry
                .file_name()
                .to_str()
                .and_then(|name| Uuid::parse_str(name).ok())
            else {
                continue;
            };

            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }

            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            groups.push(BlobGroup {
                asset_id,
                last_modified,
            });
        }

        Ok(groups)
    }
}
