/// Image rendition generation
///
/// Turns one uploaded image into stored renditions. Raster inputs get three
/// bounded JPEG renditions, animated and vector inputs are stored once and
/// shared by every tier, and favicon uploads produce a single 32x32 image.
pub mod transform;

use crate::{
    blob_store::{BlobBackend, BlobKey, BlobMeta},
    error::{CmsError, CmsResult},
};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use transform::{Encoded, TierSpec, TransformError};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &str = "jpeg, jpg, png, gif, webp, svg, bmp, tiff, ico";

/// How an upload is handled, decided by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageClass {
    Raster,
    Animated,
    Vector,
}

impl ImageClass {
    pub fn is_animated(self) -> bool {
        self == ImageClass::Animated
    }

    pub fn is_vector(self) -> bool {
        self == ImageClass::Vector
    }
}

fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Classify an upload by file extension, case-insensitively
pub fn classify(filename: &str) -> CmsResult<ImageClass> {
    match extension_of(filename).as_deref() {
        Some("jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff" | "ico") => {
            Ok(ImageClass::Raster)
        }
        Some("gif") => Ok(ImageClass::Animated),
        Some("svg") => Ok(ImageClass::Vector),
        _ => Err(CmsError::Validation(format!(
            "Only image files are allowed ({})",
            ALLOWED_EXTENSIONS
        ))),
    }
}

/// Reject a declared MIME type that contradicts the extension
pub fn check_mime(class: ImageClass, mime: Option<&str>) -> CmsResult<()> {
    let Some(mime) = mime.map(|m| m.trim().to_ascii_lowercase()) else {
        return Ok(());
    };
    let ok = match class {
        _ if mime.is_empty() || mime == "application/octet-stream" => true,
        ImageClass::Vector => mime == "image/svg+xml",
        ImageClass::Animated => mime == "image/gif",
        ImageClass::Raster => mime.starts_with("image/") && mime != "image/svg+xml" && mime != "image/gif",
    };
    if ok {
        Ok(())
    } else {
        Err(CmsError::Validation(format!(
            "File type {} does not match its extension",
            mime
        )))
    }
}

/// Named size tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenditionTier {
    Thumbnail,
    Medium,
    Large,
}

impl RenditionTier {
    pub const ALL: [RenditionTier; 3] = [
        RenditionTier::Thumbnail,
        RenditionTier::Medium,
        RenditionTier::Large,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RenditionTier::Thumbnail => "thumbnail",
            RenditionTier::Medium => "medium",
            RenditionTier::Large => "large",
        }
    }

    /// Pixel bound, JPEG quality and resampling filter. Larger tiers spend
    /// more effort on resampling.
    pub fn spec(self) -> TierSpec {
        match self {
            RenditionTier::Thumbnail => TierSpec {
                max_dimension: 300,
                quality: 80,
                filter: FilterType::Triangle,
            },
            RenditionTier::Medium => TierSpec {
                max_dimension: 900,
                quality: 85,
                filter: FilterType::CatmullRom,
            },
            RenditionTier::Large => TierSpec {
                max_dimension: 1920,
                quality: 90,
                filter: FilterType::Lanczos3,
            },
        }
    }
}

/// Where an uploaded image is going to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadPurpose {
    #[default]
    Library,
    Favicon,
}

/// One stored rendition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionDescriptor {
    pub storage_ref: BlobKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub size_kb: u64,
}

impl RenditionDescriptor {
    /// Public URL the rendition is served from
    pub fn url(&self) -> String {
        format!("/api/images/{}", self.storage_ref)
    }
}

/// Renditions of one asset. `large` is always present; favicons only have `large`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenditionSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<RenditionDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<RenditionDescriptor>,
    pub large: RenditionDescriptor,
}

impl RenditionSet {
    /// Same descriptor for every tier
    pub fn shared(descriptor: RenditionDescriptor) -> Self {
        Self {
            thumbnail: Some(descriptor.clone()),
            medium: Some(descriptor.clone()),
            large: descriptor,
        }
    }

    pub fn single(descriptor: RenditionDescriptor) -> Self {
        Self {
            thumbnail: None,
            medium: None,
            large: descriptor,
        }
    }

    /// Distinct storage refs, in tier order
    pub fn storage_refs(&self) -> Vec<BlobKey> {
        let mut refs: Vec<BlobKey> = Vec::with_capacity(3);
        for d in [self.thumbnail.as_ref(), self.medium.as_ref(), Some(&self.large)]
            .into_iter()
            .flatten()
        {
            if !refs.contains(&d.storage_ref) {
                refs.push(d.storage_ref.clone());
            }
        }
        refs
    }

    pub fn get(&self, tier: RenditionTier) -> Option<&RenditionDescriptor> {
        match tier {
            RenditionTier::Thumbnail => self.thumbnail.as_ref(),
            RenditionTier::Medium => self.medium.as_ref(),
            RenditionTier::Large => Some(&self.large),
        }
    }
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Arc<Vec<u8>>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, content_type: Option<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data: Arc::new(data),
        }
    }
}

pub fn size_in_kb(len: usize) -> u64 {
    (len as f64 / 1024.0).round() as u64
}

/// Generates and stores renditions through the configured blob backend
#[derive(Clone)]
pub struct RenditionGenerator {
    backend: Arc<dyn BlobBackend>,
    permits: Arc<Semaphore>,
}

impl RenditionGenerator {
    pub fn new(backend: Arc<dyn BlobBackend>, concurrency: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Produce and store every rendition for `upload` under `asset_id`.
    ///
    /// On failure, renditions already written for this upload are deleted
    /// best-effort before the error is returned.
    pub async fn generate(
        &self,
        asset_id: Uuid,
        upload: &UploadedImage,
        purpose: UploadPurpose,
    ) -> CmsResult<RenditionSet> {
        let class = classify(&upload.filename)?;
        check_mime(class, upload.content_type.as_deref())?;

        let mut written: Vec<BlobKey> = Vec::new();
        let result = self
            .generate_inner(asset_id, upload, class, purpose, &mut written)
            .await;

        if result.is_err() {
            self.discard(asset_id, &written).await;
        }
        result
    }

    async fn generate_inner(
        &self,
        asset_id: Uuid,
        upload: &UploadedImage,
        class: ImageClass,
        purpose: UploadPurpose,
        written: &mut Vec<BlobKey>,
    ) -> CmsResult<RenditionSet> {
        match (purpose, class) {
            (_, ImageClass::Vector) => {
                let descriptor = self
                    .store_original(asset_id, upload, "svg", "original", written)
                    .await?;
                Ok(match purpose {
                    UploadPurpose::Library => RenditionSet::shared(descriptor),
                    UploadPurpose::Favicon => RenditionSet::single(descriptor),
                })
            }
            (UploadPurpose::Library, ImageClass::Animated) => {
                let mut descriptor = self
                    .store_original(asset_id, upload, "gif", "original", written)
                    .await?;
                if let Some((w, h)) = transform::probe_dimensions(&upload.data) {
                    descriptor.width = Some(w);
                    descriptor.height = Some(h);
                }
                Ok(RenditionSet::shared(descriptor))
            }
            (UploadPurpose::Library, ImageClass::Raster) => {
                let mut descriptors = Vec::with_capacity(3);
                for tier in RenditionTier::ALL {
                    let data = Arc::clone(&upload.data);
                    let spec = tier.spec();
                    let encoded = self
                        .run_blocking(&upload.filename, move || transform::render_raster(&data, spec))
                        .await?;
                    let key = BlobKey::new(asset_id, tier.as_str(), "jpg")?;
                    descriptors.push(
                        self.store(key, encoded, upload, "image/jpeg", tier.as_str(), written)
                            .await?,
                    );
                }
                let mut tiers = descriptors.into_iter();
                let (Some(thumbnail), Some(medium), Some(large)) =
                    (tiers.next(), tiers.next(), tiers.next())
                else {
                    return Err(CmsError::Internal("Missing rendition tier".to_string()));
                };
                Ok(RenditionSet {
                    thumbnail: Some(thumbnail),
                    medium: Some(medium),
                    large,
                })
            }
            (UploadPurpose::Favicon, ImageClass::Animated) => {
                let data = Arc::clone(&upload.data);
                let encoded = self
                    .run_blocking(&upload.filename, move || transform::render_animated_favicon(&data))
                    .await?;
                let key = BlobKey::new(asset_id, "favicon", "gif")?;
                let descriptor = self
                    .store(key, encoded, upload, "image/gif", "favicon", written)
                    .await?;
                Ok(RenditionSet::single(descriptor))
            }
            (UploadPurpose::Favicon, ImageClass::Raster) => {
                let data = Arc::clone(&upload.data);
                let encoded = self
                    .run_blocking(&upload.filename, move || transform::render_favicon(&data))
                    .await?;
                let key = BlobKey::new(asset_id, "favicon", "png")?;
                let descriptor = self
                    .store(key, encoded, upload, "image/png", "favicon", written)
                    .await?;
                Ok(RenditionSet::single(descriptor))
            }
        }
    }

    /// Store the upload bytes unmodified
    async fn store_original(
        &self,
        asset_id: Uuid,
        upload: &UploadedImage,
        extension: &str,
        size_tag: &str,
        written: &mut Vec<BlobKey>,
    ) -> CmsResult<RenditionDescriptor> {
        let key = BlobKey::new(asset_id, "original", extension)?;
        let content_type = key.content_type();
        let data = upload.data.as_ref().clone();
        let size_kb = size_in_kb(data.len());

        self.backend
            .put(&key, data, &self.meta(upload, content_type, size_tag))
            .await?;
        written.push(key.clone());

        Ok(RenditionDescriptor {
            storage_ref: key,
            width: None,
            height: None,
            size_kb,
        })
    }

    async fn store(
        &self,
        key: BlobKey,
        encoded: Encoded,
        upload: &UploadedImage,
        content_type: &str,
        size_tag: &str,
        written: &mut Vec<BlobKey>,
    ) -> CmsResult<RenditionDescriptor> {
        let size_kb = size_in_kb(encoded.data.len());
        self.backend
            .put(&key, encoded.data, &self.meta(upload, content_type, size_tag))
            .await?;
        written.push(key.clone());
        debug!("Stored {} rendition {} ({} KB)", size_tag, key, size_kb);

        Ok(RenditionDescriptor {
            storage_ref: key,
            width: Some(encoded.width),
            height: Some(encoded.height),
            size_kb,
        })
    }

    fn meta(&self, upload: &UploadedImage, content_type: &str, size_tag: &str) -> BlobMeta {
        BlobMeta {
            original_name: upload.filename.clone(),
            content_type: content_type.to_string(),
            size_tag: size_tag.to_string(),
        }
    }

    /// Run a transform on the blocking pool, bounded by the semaphore
    async fn run_blocking<F>(&self, filename: &str, f: F) -> CmsResult<Encoded>
    where
        F: FnOnce() -> Result<Encoded, TransformError> + Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CmsError::Internal(format!("Transcode semaphore closed: {}", e)))?;

        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| CmsError::Internal(format!("Transcode task failed: {}", e)))?
            .map_err(|e| CmsError::processing(filename, e.stage, e.source))
    }

    /// Best-effort removal of renditions written by a failed upload
    pub async fn discard(&self, asset_id: Uuid, written: &[BlobKey]) {
        for key in written {
            if let Err(e) = self.backend.delete(key).await {
                warn!("Failed to clean up partial rendition {}: {}", key, e);
            }
        }
        if let Err(e) = self.backend.delete_group(asset_id).await {
            warn!("Failed to clean up blob group {}: {}", asset_id, e);
        }
    }
}
