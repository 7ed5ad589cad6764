/*!
 * API v1 Routes
 *
 * Defines all version 1 API routes and their handlers.
 */

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::{
    delete_webhook, delivery_history, get_medication, get_statistics, interaction_check,
    list_webhooks, load_catalog, quick_check, register_webhook, search_medications, test_webhook,
    update_webhook, validate_prescription, AppState,
};

/// Create API v1 routes
///
/// # Arguments
///
/// * `state` - Application state containing the engine and webhook manager
///
/// # Returns
///
/// Configured router for API v1
pub fn create_api_v1_routes(state: AppState) -> Router {
    // Catalog administration routes
    let catalog_routes = Router::new().route("/load", post(load_catalog));

    // Medication lookup routes
    let medication_routes = Router::new()
        .route("/search", get(search_medications))
        .route("/{id}", get(get_medication));

    // Validation routes
    let validation_routes = Router::new()
        .route("/prescription", post(validate_prescription))
        .route("/quick-check", post(quick_check))
        .route("/interaction-check", post(interaction_check));

    // Webhook management routes
    let webhook_routes = Router::new()
        .route("/", post(register_webhook).get(list_webhooks))
        .route("/deliveries", get(delivery_history))
        .route("/{id}", put(update_webhook).delete(delete_webhook))
        .route("/{id}/test", post(test_webhook));

    Router::new()
        .nest("/catalog", catalog_routes)
        .nest("/medications", medication_routes)
        .nest("/validate", validation_routes)
        .nest("/webhooks", webhook_routes)
        .route("/statistics", get(get_statistics))
        .with_state(state)
}
