/// Authentication extractors and utilities
use crate::{
    admin::AdminUser,
    context::AppContext,
    error::{CmsError, CmsResult},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use uuid::Uuid;

const ADMIN_SCOPE: &str = "admin";

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

#[derive(Debug, Serialize)]
struct AdminClaims<'a> {
    sub: String,
    email: &'a str,
    scope: &'a str,
    iat: i64,
    exp: i64,
}

/// Sign a session token for a logged-in admin
pub fn issue_admin_token(admin: &AdminUser, jwt_secret: &str, ttl_hours: i64) -> CmsResult<String> {
    let now = Utc::now();
    let claims = AdminClaims {
        sub: admin.id.to_string(),
        email: &admin.email,
        scope: ADMIN_SCOPE,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| CmsError::Internal(format!("Failed to sign session token: {}", e)))
}

/// Verify a JWT token with full validation
///
/// Checks the HS256 signature and expiry, allowing five minutes of clock skew.
pub fn verify_jwt_token(
    token: &str,
    jwt_secret: &str,
) -> CmsResult<jsonwebtoken::TokenData<serde_json::Value>> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 300;

    decode::<serde_json::Value>(token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                CmsError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                CmsError::Authentication("Invalid token signature".to_string())
            }
            _ => CmsError::Authentication(format!("Invalid token: {}", e)),
        }
    })
}

/// Admin authentication context - requires an admin-scoped session token
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub admin_id: Uuid,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = CmsError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| CmsError::Authentication("Missing authorization header".to_string()))?;

        let token_data = verify_jwt_token(&token, &state.config.authentication.jwt_secret)?;
        let claims = &token_data.claims;

        if claims.get("scope").and_then(|v| v.as_str()) != Some(ADMIN_SCOPE) {
            return Err(CmsError::Authorization(
                "Token does not have admin scope".to_string(),
            ));
        }

        let admin_id = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| CmsError::Authentication("Invalid token: missing 'sub' claim".to_string()))?;
        let email = claims
            .get("email")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        tracing::debug!("AdminAuthContext: authenticated admin {}", email);
        Ok(AdminAuthContext { admin_id, email })
    }
}
