/// API routes and handlers
pub mod content;
pub mod extract;
pub mod health;
pub mod images;
pub mod leads;
pub mod media;
pub mod middleware;
pub mod public;
pub mod sales;
pub mod session;

use crate::{config::ServerConfig, context::AppContext};
use axum::Router;

/// Build API routes
pub fn routes(config: &ServerConfig) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(public::routes())
        .merge(images::routes())
        .merge(leads::routes())
        .merge(session::routes())
        .merge(media::routes(config.service.upload_limit))
        .merge(sales::routes())
        .merge(content::routes())
}
