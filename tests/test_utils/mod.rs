/*!
 * Test Utilities
 *
 * Provides helper functions and structures for integration testing:
 * - In-memory test application with a seeded medication catalog
 * - Request/response helpers for driving the axum router
 */

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

// Re-export main application modules for testing
use rxgate_backend::{
    handlers::{health_check, AppState},
    routes::create_api_v1_routes,
    services::{CatalogRecord, ValidationEngine, WebhookManager},
};

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub engine: Arc<ValidationEngine>,
    pub webhooks: Arc<WebhookManager>,
}

impl TestApp {
    /// Create a new test application instance with an empty catalog
    pub fn new() -> Self {
        Self::build(Arc::new(ValidationEngine::new()))
    }

    /// Create a test application with the standard seeded catalog
    pub fn with_seeded_catalog() -> Self {
        let engine = Arc::new(ValidationEngine::new());
        engine.load_catalog_records(seed_records());
        Self::build(engine)
    }

    fn build(engine: Arc<ValidationEngine>) -> Self {
        let webhooks = Arc::new(WebhookManager::new());
        let state = AppState {
            engine: engine.clone(),
            webhooks: webhooks.clone(),
            start_time: std::time::SystemTime::now(),
        };

        let app = Router::new()
            .route("/health", get(health_check))
            .with_state(state.clone())
            .nest("/api/v1", create_api_v1_routes(state));

        Self {
            app,
            engine,
            webhooks,
        }
    }

    /// Send a GET request and return (status, parsed JSON body)
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    /// Send a POST request with a JSON body and return (status, parsed JSON)
    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    /// Send a DELETE request and return the status
    pub async fn delete(&self, uri: &str) -> StatusCode {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response.status()
    }
}

/// Read a response body as parsed JSON (empty object for empty bodies).
/// Falls back to the raw text wrapped in a JSON string when the body isn't
/// valid JSON (e.g. axum's built-in extractor rejections are plain text).
async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
}

fn record(id: i64, name: &str) -> CatalogRecord {
    CatalogRecord {
        id: Some(id),
        commercial_name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Standard seeded catalog used across integration tests
pub fn seed_records() -> Vec<CatalogRecord> {
    vec![
        record(1, "Warfarin 5mg 28/Tab"),
        record(2, "Aspocid 100mg 30/Tab"),
        record(3, "Glucophage 500mg 30/Tab"),
        record(4, "Lanoxin 0.25mg 30/Tab"),
        record(5, "Cordarone 200mg 30/Tab"),
        record(6, "Cipralex 10mg 28/Tab"),
        record(7, "Tramadol 50mg 20/Cap"),
        record(8, "Ciprobay 500mg 10/Tab"),
        record(9, "Panadol 500mg 24/Tab"),
        record(10, "Brufen 400mg 30/Tab"),
    ]
}
