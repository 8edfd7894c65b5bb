/// Media catalog service
use crate::{
    blob_store::BlobBackend,
    db,
    error::{CmsError, CmsResult},
    imaging::{RenditionGenerator, RenditionSet, UploadPurpose, UploadedImage},
    media::models::*,
};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use sqlx::{sqlite::SqliteRow, types::Json, Row, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const MEDIA_PER_PAGE: u32 = 24;
const BULK_DELETE_CONCURRENCY: usize = 4;

pub struct MediaCatalog {
    db: SqlitePool,
    backend: Arc<dyn BlobBackend>,
    generator: RenditionGenerator,
}

impl MediaCatalog {
    pub fn new(db: SqlitePool, backend: Arc<dyn BlobBackend>, generator: RenditionGenerator) -> Self {
        Self {
            db,
            backend,
            generator,
        }
    }

    /// Generate and store renditions, then catalogue the asset.
    ///
    /// The row is inserted only after every rendition is stored. If the
    /// insert fails the stored renditions are discarded.
    pub async fn ingest(
        &self,
        upload: &UploadedImage,
        metadata: MediaMetadata,
        purpose: UploadPurpose,
    ) -> CmsResult<MediaAsset> {
        let asset_id = Uuid::new_v4();
        let renditions = self.generator.generate(asset_id, upload, purpose).await?;

        let metadata = metadata.normalized();
        let asset = MediaAsset {
            id: asset_id,
            original_filename: upload.filename.clone(),
            title: metadata.title,
            alt_text: metadata.alt_text,
            tags: metadata.tags,
            renditions,
            created_at: Utc::now(),
        };

        if let Err(e) = self.insert(&asset).await {
            self.generator
                .discard(asset_id, &asset.renditions.storage_refs())
                .await;
            return Err(e);
        }

        info!(
            "Catalogued media {} ({}, {} stored renditions)",
            asset.id,
            asset.original_filename,
            asset.renditions.storage_refs().len()
        );
        Ok(asset)
    }

    /// Ingest several files with shared metadata. A failing file does not
    /// stop the others.
    pub async fn ingest_many(
        &self,
        uploads: &[UploadedImage],
        metadata: MediaMetadata,
        purpose: UploadPurpose,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        for upload in uploads {
            match self.ingest(upload, metadata.clone(), purpose).await {
                Ok(asset) => report.uploaded.push(asset),
                Err(e) => {
                    warn!("Upload of {} failed: {}", upload.filename, e);
                    report.failed.push(IngestFailure {
                        filename: upload.filename.clone(),
                        error: public_message(&e),
                    });
                }
            }
        }
        report
    }

    async fn insert(&self, asset: &MediaAsset) -> CmsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO media (id, original_filename, title, alt_text, tags, renditions, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(asset.id)
        .bind(&asset.original_filename)
        .bind(&asset.title)
        .bind(&asset.alt_text)
        .bind(Json(&asset.tags))
        .bind(Json(&asset.renditions))
        .bind(asset.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Newest first, filtered by title substring or exact tag
    pub async fn list(&self, query: &MediaQuery) -> CmsResult<MediaPage> {
        let page = query.page.unwrap_or(1).max(1);
        let q = query.q.as_deref().map(str::trim).unwrap_or_default();

        let filter = r#"
            (?1 = '' OR title LIKE ?2 ESCAPE '\'
             OR EXISTS (SELECT 1 FROM json_each(media.tags) WHERE json_each.value = ?1))
        "#;

        let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS n FROM media WHERE {}", filter))
            .bind(q)
            .bind(db::like_pattern(q))
            .fetch_one(&self.db)
            .await?
            .try_get("n")?;

        let rows = sqlx::query(&format!(
            "SELECT * FROM media WHERE {} ORDER BY created_at DESC LIMIT ?3 OFFSET ?4",
            filter
        ))
        .bind(q)
        .bind(db::like_pattern(q))
        .bind(i64::from(MEDIA_PER_PAGE))
        .bind(db::page_offset(page, MEDIA_PER_PAGE))
        .fetch_all(&self.db)
        .await?;

        let items = rows.iter().map(row_to_asset).collect::<CmsResult<Vec<_>>>()?;
        let total_pages = ((total.max(0) as u32) + MEDIA_PER_PAGE - 1) / MEDIA_PER_PAGE;

        Ok(MediaPage {
            items,
            total,
            page,
            per_page: MEDIA_PER_PAGE,
            total_pages: total_pages.max(1),
        })
    }

    /// Every asset, newest first
    pub async fn list_all(&self) -> CmsResult<Vec<MediaAsset>> {
        let rows = sqlx::query("SELECT * FROM media ORDER BY created_at DESC")
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(row_to_asset).collect()
    }

    pub async fn get(&self, id: Uuid) -> CmsResult<MediaAsset> {
        let row = sqlx::query("SELECT * FROM media WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| CmsError::NotFound(format!("Media {} not found", id)))?;
        row_to_asset(&row)
    }

    pub async fn count(&self) -> CmsResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM media")
            .fetch_one(&self.db)
            .await?;
        Ok(row.try_get("n")?)
    }

    pub async fn update_metadata(&self, id: Uuid, metadata: MediaMetadata) -> CmsResult<MediaAsset> {
        let metadata = metadata.normalized();
        let result = sqlx::query(
            "UPDATE media SET title = ?1, alt_text = ?2, tags = ?3 WHERE id = ?4",
        )
        .bind(&metadata.title)
        .bind(&metadata.alt_text)
        .bind(Json(&metadata.tags))
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CmsError::NotFound(format!("Media {} not found", id)));
        }
        self.get(id).await
    }

    /// Remove an asset.
    ///
    /// The catalog row goes first so it never points at missing renditions.
    /// Every distinct rendition blob is then attempted and failures are logged;
    /// the orphan sweep picks up whatever is left behind.
    pub async fn delete(&self, id: Uuid) -> CmsResult<()> {
        let asset = self.get(id).await?;

        sqlx::query("DELETE FROM media WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        self.delete_blobs(&asset.renditions, id).await;

        info!("Deleted media {} ({})", id, asset.original_filename);
        Ok(())
    }

    async fn delete_blobs(&self, renditions: &RenditionSet, asset_id: Uuid) {
        for key in renditions.storage_refs() {
            if let Err(e) = self.backend.delete(&key).await {
                warn!("Failed to delete rendition {} (needs manual cleanup): {}", key, e);
            }
        }
        if let Err(e) = self.backend.delete_group(asset_id).await {
            warn!("Failed to delete blob group {} (needs manual cleanup): {}", asset_id, e);
        }
    }

    /// Delete many assets with bounded concurrency, tolerating per-item failures
    pub async fn bulk_delete(&self, ids: &[Uuid]) -> BulkDeleteReport {
        let results: Vec<(Uuid, CmsResult<()>)> = stream::iter(ids.iter().copied())
            .map(|id| async move { (id, self.delete(id).await) })
            .buffer_unordered(BULK_DELETE_CONCURRENCY)
            .collect()
            .await;

        let mut report = BulkDeleteReport::default();
        for (id, result) in results {
            match result {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!("Bulk delete of media {} failed: {}", id, e);
                    report.failed += 1;
                    report.errors.push(format!("{}: {}", id, public_message(&e)));
                }
            }
        }
        report
    }

    /// Remove blob groups older than `min_age` that no catalog row points at.
    ///
    /// These are left behind when a process dies between storing renditions
    /// and inserting the row.
    pub async fn sweep_orphans(&self, min_age: Duration) -> CmsResult<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - min_age;
        let mut removed = 0;

        for group in self.backend.list_groups().await? {
            if group.last_modified > cutoff {
                continue;
            }

            let known = sqlx::query("SELECT 1 FROM media WHERE id = ?1")
                .bind(group.asset_id)
                .fetch_optional(&self.db)
                .await?
                .is_some();
            if known {
                continue;
            }

            match self.backend.delete_group(group.asset_id).await {
                Ok(()) => {
                    info!("Removed orphaned renditions for {}", group.asset_id);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove orphaned group {}: {}", group.asset_id, e),
            }
        }

        Ok(removed)
    }
}

/// Message safe to show an admin for a failed item
fn public_message(err: &CmsError) -> String {
    match err {
        CmsError::Validation(msg) => msg.clone(),
        CmsError::NotFound(_) => err.to_string(),
        CmsError::Processing { .. } => "The image could not be processed".to_string(),
        _ => "Upload failed".to_string(),
    }
}

fn row_to_asset(row: &SqliteRow) -> CmsResult<MediaAsset> {
    let tags: Json<Vec<String>> = row.try_get("tags")?;
    let renditions: Json<RenditionSet> = row.try_get("renditions")?;
    Ok(MediaAsset {
        id: row.try_get("id")?,
        original_filename: row.try_get("original_filename")?,
        title: row.try_get("title")?,
        alt_text: row.try_get("alt_text")?,
        tags: tags.0,
        renditions: renditions.0,
        created_at: row.try_get("created_at")?,
    })
}
