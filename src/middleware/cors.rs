/*!
 * CORS (Cross-Origin Resource Sharing) Configuration
 *
 * Configures CORS headers so pharmacy-network frontends and integration
 * dashboards can call the validation API from the browser. Development
 * defaults are permissive; production requires explicit origins.
 */

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// CORS configuration builder
pub struct CorsConfig {
    /// Allowed origins (defaults to localhost for development)
    pub allowed_origins: Vec<String>,
    /// Maximum age for preflight cache
    pub max_age: Duration,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:5173".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            max_age: Duration::from_secs(3600),
        }
    }
}

impl CorsConfig {
    /// Permissive configuration for local development
    pub fn development() -> Self {
        Self::default()
    }

    /// Strict configuration for production: only the given origins, with a
    /// shorter preflight cache.
    pub fn production(allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_origins,
            max_age: Duration::from_secs(600),
        }
    }

    /// Build the tower-http CORS layer for the router
    pub fn into_layer(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        let cors = CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                ACCEPT,
                AUTHORIZATION,
                CONTENT_TYPE,
                HeaderName::from_static("x-request-id"),
            ])
            .max_age(self.max_age);

        if origins.is_empty() {
            cors.allow_origin(Any)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Build a CORS layer from the CORS_ALLOWED_ORIGINS environment variable
/// (comma-separated origins); falls back to development defaults.
pub fn cors_from_env() -> CorsLayer {
    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins_str) => {
            let origins: Vec<String> = origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            if origins.is_empty() {
                CorsConfig::development().into_layer()
            } else {
                CorsConfig::production(origins).into_layer()
            }
        }
        Err(_) => CorsConfig::development().into_layer(),
    }
}
