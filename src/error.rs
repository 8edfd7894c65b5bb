/// Unified error types for Poolside CMS
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the CMS
#[derive(Error, Debug)]
pub enum CmsError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Missing or malformed input, shown to the caller verbatim
    #[error("{0}")]
    Validation(String),

    /// Honeypot tripped on a public form
    #[error("Spam detected")]
    Spam,

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict errors (e.g., deleting a customer with sales)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Decode/resize/encode failure while generating renditions
    #[error("Failed to process {filename} during {stage}: {message}")]
    Processing {
        filename: String,
        stage: &'static str,
        message: String,
    },

    /// Blob storage errors
    #[error("Blob storage error: {0}")]
    Storage(String),

    /// Lead notification delivery failure; never returned to submitters
    #[error("Notification error: {0}")]
    Notification(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CmsError {
    pub fn processing(filename: &str, stage: &'static str, err: impl std::fmt::Display) -> Self {
        CmsError::Processing {
            filename: filename.to_string(),
            stage,
            message: err.to_string(),
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            CmsError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            CmsError::Authorization(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            CmsError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CmsError::Spam => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                "Submission rejected".to_string(),
            ),
            CmsError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            CmsError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            CmsError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimitExceeded",
                "Rate limit exceeded".to_string(),
            ),
            CmsError::Processing { filename, stage, .. } => {
                tracing::error!(filename = %filename, stage = %stage, "{}", self);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "ProcessingFailed",
                    "The image could not be processed".to_string(),
                )
            }
            CmsError::Database(_)
            | CmsError::Migration(_)
            | CmsError::Storage(_)
            | CmsError::Notification(_)
            | CmsError::Internal(_)
            | CmsError::Io(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalServerError",
                    "Internal server error".to_string(), // Don't leak details
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        let mut response = (status, body).into_response();
        if let CmsError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for CMS operations
pub type CmsResult<T> = Result<T, CmsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_status() {
        let response = CmsError::Validation("Customer is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = CmsError::Storage("bucket exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_processing_status() {
        let err = CmsError::processing("cat.png", "decode", "bad header");
        assert!(err.to_string().contains("cat.png"));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = CmsError::RateLimitExceeded {
            retry_after: std::time::Duration::from_secs(30),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "30");
    }
}
