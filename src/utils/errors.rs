/*!
 * Error Handling
 *
 * Defines application-wide error types and conversion implementations
 * for proper error handling and HTTP response mapping.
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
///
/// The engine signals four error kinds to the transport layer. Per-medication
/// failures (unparsable catalog row, missing rule lookup) are recovered
/// locally and never surface here; only errors that prevent forming any
/// result at all become an `AppError`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Unknown medication id or webhook subscription id
    #[error("Not found: {0}")]
    NotFound(String),
    /// Malformed input, invalid enum token, or underivable GFR where required
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// A query arrived before the medication catalog was loaded
    #[error("Medication catalog not loaded")]
    CatalogNotLoaded,
    /// Unexpected table inconsistency or load failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", msg),
            Self::CatalogNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CATALOG_NOT_LOADED",
                "database_not_loaded".to_string(),
            ),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_code,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

/// Convert anyhow errors (catalog file loading internals) to AppError
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:?}", err);
        Self::Internal(err.to_string())
    }
}
