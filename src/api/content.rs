/// Admin CRUD for products, projects, services and site settings
use crate::{
    api::extract::{parse_id, JsonOrForm},
    auth::AdminAuthContext,
    content::{
        Product, ProductInput, Project, ProjectInput, ProjectPage, ProjectQuery, Service,
        ServiceInput, SettingsInput, SiteSettings, PROJECTS_PER_PAGE,
    },
    context::AppContext,
    error::CmsResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

/// Build admin content routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/products", get(list_products).post(create_product))
        .route(
            "/admin/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/admin/projects", get(list_projects).post(create_project))
        .route(
            "/admin/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/admin/services", get(list_services).post(create_service))
        .route(
            "/admin/services/:id",
            get(get_service).put(update_service).delete(delete_service),
        )
        .route("/admin/settings", get(get_settings).put(update_settings))
}

// Products

/// Every product, including inactive ones
async fn list_products(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<Vec<Product>>> {
    Ok(Json(ctx.products.list(false).await?))
}

async fn create_product(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    JsonOrForm(input): JsonOrForm<ProductInput>,
) -> CmsResult<(StatusCode, Json<Product>)> {
    Ok((StatusCode::CREATED, Json(ctx.products.create(input).await?)))
}

async fn get_product(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<Product>> {
    Ok(Json(ctx.products.get(parse_id(&id, "Product")?).await?))
}

async fn update_product(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonOrForm(input): JsonOrForm<ProductInput>,
) -> CmsResult<Json<Product>> {
    let id = parse_id(&id, "Product")?;
    Ok(Json(ctx.products.update(id, input).await?))
}

async fn delete_product(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.products.delete(parse_id(&id, "Product")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Projects

async fn list_projects(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Query(query): Query<ProjectQuery>,
) -> CmsResult<Json<ProjectPage>> {
    Ok(Json(ctx.projects.list(&query, PROJECTS_PER_PAGE).await?))
}

async fn create_project(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    JsonOrForm(input): JsonOrForm<ProjectInput>,
) -> CmsResult<(StatusCode, Json<Project>)> {
    Ok((StatusCode::CREATED, Json(ctx.projects.create(input).await?)))
}

async fn get_project(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<Project>> {
    Ok(Json(ctx.projects.get(parse_id(&id, "Project")?).await?))
}

async fn update_project(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonOrForm(input): JsonOrForm<ProjectInput>,
) -> CmsResult<Json<Project>> {
    let id = parse_id(&id, "Project")?;
    Ok(Json(ctx.projects.update(id, input).await?))
}

async fn delete_project(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.projects.delete(parse_id(&id, "Project")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Services

async fn list_services(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<Vec<Service>>> {
    Ok(Json(ctx.services.list().await?))
}

async fn create_service(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    JsonOrForm(input): JsonOrForm<ServiceInput>,
) -> CmsResult<(StatusCode, Json<Service>)> {
    Ok((StatusCode::CREATED, Json(ctx.services.create(input).await?)))
}

async fn get_service(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<Json<Service>> {
    Ok(Json(ctx.services.get(parse_id(&id, "Service")?).await?))
}

async fn update_service(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    JsonOrForm(input): JsonOrForm<ServiceInput>,
) -> CmsResult<Json<Service>> {
    let id = parse_id(&id, "Service")?;
    Ok(Json(ctx.services.update(id, input).await?))
}

async fn delete_service(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> CmsResult<StatusCode> {
    ctx.services.delete(parse_id(&id, "Service")?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Settings

async fn get_settings(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<SiteSettings>> {
    Ok(Json(ctx.settings.get().await?))
}

async fn update_settings(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
    JsonOrForm(input): JsonOrForm<SettingsInput>,
) -> CmsResult<Json<SiteSettings>> {
    Ok(Json(ctx.settings.update(input).await?))
}
