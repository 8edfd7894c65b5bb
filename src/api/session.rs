/// Admin login and dashboard endpoints
use crate::{
    admin::{AdminUser, Dashboard},
    api::extract::{ClientIp, JsonOrForm},
    auth::{issue_admin_token, AdminAuthContext},
    context::AppContext,
    error::CmsResult,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build session routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/me", get(current_admin))
        .route("/admin/dashboard", get(dashboard))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_in: i64,
    pub admin: AdminUser,
}

/// Exchange admin credentials for a bearer token
async fn login(
    State(ctx): State<AppContext>,
    ClientIp(client): ClientIp,
    JsonOrForm(request): JsonOrForm<LoginRequest>,
) -> CmsResult<Json<LoginResponse>> {
    ctx.rate_limiter.check_login(client)?;

    let admin = ctx.admins.authenticate(&request.email, &request.password).await?;
    let auth = &ctx.config.authentication;
    let access_token = issue_admin_token(&admin, &auth.jwt_secret, auth.session_ttl_hours)?;

    tracing::info!("Admin {} logged in", admin.email);
    Ok(Json(LoginResponse {
        access_token,
        expires_in: auth.session_ttl_hours * 3600,
        admin,
    }))
}

async fn current_admin(
    auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<AdminUser>> {
    Ok(Json(ctx.admins.get(auth.admin_id).await?))
}

async fn dashboard(
    _auth: AdminAuthContext,
    State(ctx): State<AppContext>,
) -> CmsResult<Json<Dashboard>> {
    Ok(Json(Dashboard::load(&ctx).await?))
}
