/*!
 * RxGate Backend - Prescription Validation Engine
 *
 * Main application entry point for the Axum-based REST API server.
 *
 * Validates prescriptions for drug-drug interactions, renal dose
 * adjustments and contraindications, and fans blocked-prescription alerts
 * out to webhook subscribers.
 */

// Module declarations
mod config;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use axum::{
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use handlers::{health_check, AppState};
use middleware::cors_from_env;
use routes::create_api_v1_routes;
use services::{ValidationEngine, WebhookManager, WebhookSubscription};

/// API version info response
#[derive(Debug, serde::Serialize)]
struct VersionResponse {
    name: String,
    version: String,
    rust_version: String,
    git_commit: Option<String>,
    build_timestamp: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RxGate Backend API Server...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");
    tracing::info!("Environment: {}", config.server.environment);

    // Construct the validation engine
    let engine = if config.engine.ensemble_ddi {
        tracing::info!("Ensemble DDI path enabled");
        Arc::new(ValidationEngine::with_ensemble())
    } else {
        Arc::new(ValidationEngine::new())
    };

    // Auto-load the medication catalog from the first existing candidate
    let mut catalog_loaded = false;
    for path in &config.catalog.auto_load_paths {
        if !std::path::Path::new(path).exists() {
            continue;
        }
        match engine.load_catalog_from_file(path) {
            Ok(summary) => {
                tracing::info!(
                    "Auto-loaded {} medications from {}",
                    summary.medications_loaded,
                    path
                );
                catalog_loaded = true;
                break;
            }
            Err(e) => {
                tracing::warn!("Failed to load catalog from {}: {}", path, e);
            }
        }
    }
    if !catalog_loaded {
        tracing::warn!("Medication catalog not auto-loaded. Use POST /api/v1/catalog/load.");
    }

    // Create the webhook manager and wire the default subscriber
    let webhooks = Arc::new(WebhookManager::new());
    if let Some(url) = &config.webhook.default_url {
        let subscription = WebhookSubscription {
            id: "default-dispatch".to_string(),
            name: "Default Dispatch Endpoint".to_string(),
            url: url.clone(),
            secret: config.webhook.default_secret().to_string(),
            events: vec![
                "prescription.blocked".to_string(),
                "interaction.major".to_string(),
                "contraindication.detected".to_string(),
            ],
            active: true,
            created_at: chrono::Utc::now(),
            headers: Default::default(),
            retry_count: 3,
            retry_delay_seconds: 60,
        };
        match webhooks.register(subscription) {
            Ok(_) => tracing::info!("Registered default webhook: {}", url),
            Err(e) => tracing::warn!("Failed to register default webhook: {}", e),
        }
    }

    // Create application state
    let app_state = AppState {
        engine,
        webhooks,
        start_time: std::time::SystemTime::now(),
    };

    // Build application router
    let app = create_app(app_state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");
    tracing::info!("HTTP server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Create the Axum application router
///
/// # Arguments
///
/// * `state` - Application state containing the engine and webhook manager
fn create_app(state: AppState) -> Router {
    Router::new()
        // Health check endpoints
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .with_state(state.clone())
        // API version endpoint
        .route("/api/version", get(version_handler))
        // Root endpoint
        .route("/", get(root_handler))
        // API v1 routes
        .nest("/api/v1", create_api_v1_routes(state))
        // Add middleware (CORS must be added before tracing)
        .layer(cors_from_env())
        .layer(TraceLayer::new_for_http())
}

/// Root handler - API information
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "RxGate Backend API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Prescription Validation Engine",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "api_v1": "/api/v1"
        }
    }))
}

/// Version info handler
async fn version_handler() -> impl IntoResponse {
    let response = VersionResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rust_version: env!("CARGO_PKG_RUST_VERSION").to_string(),
        git_commit: option_env!("GIT_COMMIT").map(|s| s.to_string()),
        build_timestamp: option_env!("BUILD_TIMESTAMP").map(|s| s.to_string()),
    };

    Json(response)
}

// Unit tests omitted - endpoint behavior is covered by the integration
// tests in tests/
