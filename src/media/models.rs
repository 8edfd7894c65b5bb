/// Media catalog data models
use crate::{forms, imaging::RenditionSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalogued image with its stored renditions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: Uuid,
    pub original_filename: String,
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub tags: Vec<String>,
    pub renditions: RenditionSet,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    /// URL of the largest rendition
    pub fn url(&self) -> String {
        self.renditions.large.url()
    }
}

/// Editable metadata, shared by uploads and edits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt_text: Option<String>,
    #[serde(default, deserialize_with = "forms::string_list")]
    pub tags: Vec<String>,
}

impl MediaMetadata {
    /// Trim text fields and drop blank ones
    pub fn normalized(self) -> Self {
        Self {
            title: forms::blank_as_none(self.title),
            alt_text: forms::blank_as_none(self.alt_text),
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaQuery {
    /// Matches a title substring or an exact tag
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub items: Vec<MediaAsset>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

/// Outcome of a multi-file upload
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub uploaded: Vec<MediaAsset>,
    pub failed: Vec<IngestFailure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestFailure {
    pub filename: String,
    pub error: String,
}

/// Outcome of a bulk delete
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteReport {
    pub deleted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Compact entry for media pickers
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPickerItem {
    pub id: Uuid,
    pub url: String,
    pub thumbnail_url: String,
    pub title: Option<String>,
    pub alt_text: Option<String>,
}

impl From<&MediaAsset> for MediaPickerItem {
    fn from(asset: &MediaAsset) -> Self {
        let thumbnail = asset
            .renditions
            .thumbnail
            .as_ref()
            .unwrap_or(&asset.renditions.large);
        Self {
            id: asset.id,
            url: asset.url(),
            thumbnail_url: thumbnail.url(),
            title: asset.title.clone(),
            alt_text: asset.alt_text.clone(),
        }
    }
}
