/// S3-compatible content store backend
use crate::blob_store::{BlobBackend, BlobGroup, BlobKey, BlobMeta, StoredBlob};
use crate::error::{CmsError, CmsResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// S3 blob storage backend
///
/// Supports AWS S3 and S3-compatible providers (MinIO, DigitalOcean Spaces, etc.).
/// Objects live at `{prefix}{asset_id}/{file_name}` with the original upload
/// name and size tier recorded as object metadata.
#[derive(Clone)]
pub struct S3BlobBackend {
    client: Arc<Client>,
    bucket: String,
    prefix: String,
}

/// Configuration for S3 storage
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services, e.g. "http://localhost:9000"
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Path prefix for all objects (default: "media/")
    pub prefix: String,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            prefix: "media/".to_string(),
        }
    }
}

impl S3BlobBackend {
    pub async fn new(config: S3Config) -> CmsResult<Self> {
        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "poolside-cms",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);
        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }

    fn object_key(&self, key: &BlobKey) -> String {
        object_key(&self.prefix, key)
    }

    fn group_prefix(&self, asset_id: Uuid) -> String {
        format!("{}{}/", self.prefix, asset_id)
    }

    /// List object keys and modification times under `prefix`
    async fn list_objects(&self, prefix: &str) -> CmsResult<Vec<(String, Option<DateTime<Utc>>)>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                error!("Failed to list S3 objects under {}: {}", prefix, e);
                CmsError::Storage(format!("S3 list failed: {}", e))
            })?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    let modified = object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), 0));
                    objects.push((key.to_string(), modified));
                }
            }
        }

        Ok(objects)
    }
}

fn object_key(prefix: &str, key: &BlobKey) -> String {
    format!("{}{}", prefix, key)
}

/// Asset id from an object key laid out as `{prefix}{asset_id}/{file}`
fn asset_id_from_object_key(prefix: &str, object_key: &str) -> Option<Uuid> {
    let rest = object_key.strip_prefix(prefix)?;
    let (id, _) = rest.split_once('/')?;
    Uuid::parse_str(id).ok()
}

/// S3 user metadata must be printable ASCII
fn metadata_value(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}

fn is_not_found<E: std::fmt::Debug>(err: &E) -> bool {
    let msg = format!("{:?}", err);
    msg.contains("NoSuchKey") || msg.contains("NotFound")
}

#[async_trait]
impl BlobBackend for S3BlobBackend {
    async fn put(&self, key: &BlobKey, data: Vec<u8>, meta: &BlobMeta) -> CmsResult<()> {
        let object_key = self.object_key(key);

        debug!(
            "Uploading rendition to S3: {} ({} bytes, type: {})",
            object_key,
            data.len(),
            meta.content_type
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(data))
            .content_type(&meta.content_type)
            .metadata("original-name", metadata_value(&meta.original_name))
            .metadata("size-tag", metadata_value(&meta.size_tag))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload blob to S3: {}", e);
                CmsError::Storage(format!("S3 upload failed: {}", e))
            })?;

        Ok(())
    }

    async fn get(&self, key: &BlobKey) -> CmsResult<Option<StoredBlob>> {
        let object_key = self.object_key(key);

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(response) => {
                let content_type = response
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| key.content_type().to_string());
                let data = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        error!("Failed to read S3 object body: {}", e);
                        CmsError::Storage(format!("Failed to read S3 object: {}", e))
                    })?
                    .into_bytes()
                    .to_vec();

                Ok(Some(StoredBlob { data, content_type }))
            }
            Err(e) if is_not_found(&e) => {
                debug!("Blob not found in S3: {}", object_key);
                Ok(None)
            }
            Err(e) => {
                error!("Failed to download blob from S3: {}", e);
                Err(CmsError::Storage(format!("S3 download failed: {}", e)))
            }
        }
    }

    async fn delete(&self, key: &BlobKey) -> CmsResult<()> {
        let object_key = self.object_key(key);

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete blob from S3: {}", e);
                CmsError::Storage(format!("S3 delete failed: {}", e))
            })?;

        debug!("Deleted blob from S3: {}", object_key);
        Ok(())
    }

    async fn exists(&self, key: &BlobKey) -> CmsResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => {
                error!("Failed to check blob existence in S3: {}", e);
                Err(CmsError::Storage(format!("S3 head object failed: {}", e)))
            }
        }
    }

    async fn delete_group(&self, asset_id: Uuid) -> CmsResult<()> {
        let prefix = self.group_prefix(asset_id);
        for (object_key, _) in self.list_objects(&prefix).await? {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&object_key)
                .send()
                .await
                .map_err(|e| {
                    error!("Failed to delete {} from S3: {}", object_key, e);
                    CmsError::Storage(format!("S3 delete failed: {}", e))
                })?;
        }
        Ok(())
    }

    async fn list_groups(&self) -> CmsResult<Vec<BlobGroup>> {
        let mut groups: HashMap<Uuid, DateTime<Utc>> = HashMap::new();

        for (object_key, modified) in self.list_objects(&self.prefix).await? {
            let Some(asset_id) = asset_id_from_object_key(&self.prefix, &object_key) else {
                continue;
            };
            let modified = modified.unwrap_or_else(Utc::now);
            groups
                .entry(asset_id)
                .and_modify(|latest| *latest = (*latest).max(modified))
                .or_insert(modified);
        }

        Ok(groups
            .into_iter()
            .map(|(asset_id, last_modified)| BlobGroup {
                asset_id,
                last_modified,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        let id = Uuid::new_v4();
        let key = BlobKey::new(id, "medium", "jpg").unwrap();
        assert_eq!(object_key("media/", &key), format!("media/{}/medium.jpg", id));
    }

    #[test]
    fn test_asset_id_from_object_key() {
        let id = Uuid::new_v4();
        assert_eq!(
            asset_id_from_object_key("media/", &format!("media/{}/large.jpg", id)),
            Some(id)
        );
        assert_eq!(asset_id_from_object_key("media/", "other/x.jpg"), None);
        assert_eq!(asset_id_from_object_key("media/", "media/loose.jpg"), None);
    }

    #[test]
    fn test_metadata_value_is_ascii() {
        assert_eq!(metadata_value("piscine été.jpg"), "piscine _t_.jpg");
    }

    #[test]
    fn test_s3_config_default() {
        let config = S3Config::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.prefix, "media/");
        assert!(config.endpoint.is_none());
    }
}
