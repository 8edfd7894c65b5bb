/// Read-only endpoints for the public marketing site
use crate::{
    content::{Product, Project, ProjectPage, ProjectQuery, Service, SiteSettings, PORTFOLIO_PER_PAGE},
    context::AppContext,
    error::CmsResult,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

/// Build public content routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/site", get(site_settings))
        .route("/api/services", get(list_services))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/:slug", get(get_project))
        .route("/api/products", get(list_products))
        .route("/api/products/:slug", get(get_product))
}

/// Company info for page headers; defaults when the settings row is unreadable
async fn site_settings(State(ctx): State<AppContext>) -> Json<SiteSettings> {
    Json(ctx.settings.get_or_default().await)
}

async fn list_services(State(ctx): State<AppContext>) -> CmsResult<Json<Vec<Service>>> {
    Ok(Json(ctx.services.list().await?))
}

/// Portfolio listing, filterable by type and status
async fn list_projects(
    State(ctx): State<AppContext>,
    Query(query): Query<ProjectQuery>,
) -> CmsResult<Json<ProjectPage>> {
    Ok(Json(ctx.projects.list(&query, PORTFOLIO_PER_PAGE).await?))
}

async fn get_project(
    State(ctx): State<AppContext>,
    Path(slug): Path<String>,
) -> CmsResult<Json<Project>> {
    Ok(Json(ctx.projects.get_by_slug(&slug).await?))
}

/// Active products only
async fn list_products(State(ctx): State<AppContext>) -> CmsResult<Json<Vec<Product>>> {
    Ok(Json(ctx.products.list(true).await?))
}

async fn get_product(
    State(ctx): State<AppContext>,
    Path(slug): Path<String>,
) -> CmsResult<Json<Product>> {
    Ok(Json(ctx.products.get_active_by_slug(&slug).await?))
}
