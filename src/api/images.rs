/// Rendition serving
use crate::{blob_store::BlobKey, context::AppContext, error::{CmsError, CmsResult}};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

const IMMUTABLE: &str = "public, max-age=31536000, immutable";

/// Build image routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/images/*reference", get(get_image))
}

/// Serve a stored rendition by reference.
///
/// Renditions never change once written, so the reference doubles as the ETag.
async fn get_image(
    State(ctx): State<AppContext>,
    Path(reference): Path<String>,
    headers: HeaderMap,
) -> CmsResult<Response> {
    let key = BlobKey::parse(&reference)?;
    let etag = format!("\"{}\"", key);

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if if_none_match == Some(etag.as_str()) && ctx.blob_backend.exists(&key).await? {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag), (header::CACHE_CONTROL, IMMUTABLE.to_string())],
        )
            .into_response());
    }

    let blob = ctx
        .blob_backend
        .get(&key)
        .await?
        .ok_or_else(|| CmsError::NotFound(format!("Image not found: {}", key)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, blob.content_type),
            (header::CONTENT_LENGTH, blob.data.len().to_string()),
            (header::ETAG, etag),
            (header::CACHE_CONTROL, IMMUTABLE.to_string()),
        ],
        Body::from(blob.data),
    )
        .into_response())
}
