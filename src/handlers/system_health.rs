/*!
 * System Health HTTP Handlers
 *
 * Liveness and readiness reporting for load balancers and monitors.
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub medications_loaded: usize,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

/// Health check handler
///
/// GET /health
///
/// Reports `database_not_loaded` (still HTTP 200 - the process is alive)
/// until a catalog load completes.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.engine.is_catalog_loaded();
    let uptime = state.start_time.elapsed().unwrap_or_default().as_secs();

    let response = HealthResponse {
        status: if loaded {
            "healthy".to_string()
        } else {
            "database_not_loaded".to_string()
        },
        medications_loaded: state.engine.medications_loaded(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}
