/// Request middleware
use crate::{content::PageViews, context::AppContext};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Record public GET requests as page views.
///
/// Recording runs in a detached task so a slow or failing write never
/// delays the response.
pub async fn track_page_views(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Response {
    if PageViews::is_tracked(req.method(), req.uri().path()) {
        let path = req.uri().path().to_string();
        let page_views = ctx.page_views.clone();
        tokio::spawn(async move {
            if let Err(e) = page_views.record(&path).await {
                tracing::warn!("Failed to record page view for {}: {}", path, e);
            }
        });
    }

    next.run(req).await
}
