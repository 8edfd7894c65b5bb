/// Admin media library endpoints
use crate::{
    api::extract::parse_id,
    auth::AdminAuthContext,
    context::AppContext,
    error::{CmsError, CmsResult},
    forms,
    imaging::{UploadPurpose, UploadedImage},
    media::{BulkDeleteReport, MediaAsset, MediaMetadata, MediaPage, MediaPickerItem, MediaQuery},
};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

/// Build media routes; uploads accept bodies up to `upload_limit` bytes
pub fn routes(upload_limit: usize) -> Router<AppContext> {
    Router::new()
        .route(
            "/admin/media",
            get(list_media)
                .post(upload_media)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/admin/media/all", get(media_picker))
        .route("/admin/media/bulk-delete", post(bulk_delete))
        .route(
            "/admin/media/:id",
            get(get_media).put(update_media).delete(delete_media),
        )
}

fn multipart_error(e: MultipartError) -> CmsError {
    CmsError::Validation(format!("Invalid upload: {}", e.body_text()))
}

/// Files plus the shared metadata fields of one upload form
async fn read_upload_form(
    mut multipart: Multipart,
) -> CmsResult<(Vec<UploadedImage>, MediaMetadata, UploadPurpose)> {
    let mut uploads = Vec::new();
    let mut metadata = MediaMetadata::default();
    let mut purpose = UploadPurpose::Library;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(filename) = field.file_name().map(str::to_string) {
            if filename.is_empty() {
                continue;
            }
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            uploads.push(UploadedImage::new(filename, content_type, data.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "title" => metadata.title = Some(value),
            "altText" | "alt_text" => metadata.alt_text = Some(value),
            "tags" => metadata.tags = forms::split_tags(&value),
            "purpose" if value.trim().eq_ignore_ascii_case("favicon") => {
                purpose = UploadPurpose::Favicon
            }
            _ => {}
        }
    }

    Ok((uploads, metadata, purpose))
}

/// Multi-file upload. Files that fail are reported next to the ones that
/// succeeded.
async fn upload_media(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> CmsResult<impl IntoResponse> {
    let (uploads, metadata, purpose) = read_upload_form(multipart).await?;
    if uploads.is_empty() {
        return Err(CmsError::Validation("No image files uploaded".to_string()));
    }

    let report = ctx.media.ingest_many(&uploads, metadata, purpose).await;
    let status = if report.uploaded.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(report)))
}

async fn list_media(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Query(query): Query<MediaQuery>,
) -> CmsResult<Json<MediaPage>> {
    Ok(Json(ctx.media.list(&query).await?))
}

/// Every asset in compact form, for image pickers
async fn media_picker(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<Vec<MediaPickerItem>>> {
    let assets = ctx.media.list_all().await?;
    Ok(Json(assets.iter().map(MediaPickerItem::from).collect()))
}

async fn get_media(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<MediaAsset>> {
    Ok(Json(ctx.media.get(parse_id(&id, "Media")?).await?))
}

async fn update_media(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(metadata): Json<MediaMetadata>,
) -> CmsResult<Json<MediaAsset>> {
    let id = parse_id(&id, "Media")?;
    Ok(Json(ctx.media.update_metadata(id, metadata).await?))
}

async fn delete_media(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.media.delete(parse_id(&id, "Media")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BulkDeleteRequest {
    ids: Vec<Uuid>,
}

async fn bulk_delete(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Json(request): Json<BulkDeleteRequest>,
) -> CmsResult<Json<BulkDeleteReport>> {
    if request.ids.is_empty() {
        return Err(CmsError::Validation("No media selected".to_string()));
    }
    Ok(Json(ctx.media.bulk_delete(&request.ids).await))
}
