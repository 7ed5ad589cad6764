/*!
 * HTTP Request Handlers Module
 *
 * Contains all HTTP request handlers for the API endpoints, plus the
 * shared application state they receive.
 */

use std::sync::Arc;

use crate::services::{ValidationEngine, WebhookManager};

pub mod medications;
pub mod system_health;
pub mod validation;
pub mod webhooks;

pub use medications::{get_medication, get_statistics, load_catalog, search_medications};
pub use system_health::health_check;
pub use validation::{interaction_check, quick_check, validate_prescription};
pub use webhooks::{
    delete_webhook, delivery_history, list_webhooks, register_webhook, test_webhook,
    update_webhook,
};

/// Shared application state passed to all handlers
///
/// The engine and webhook manager are constructed once at startup; handlers
/// receive cheap clones of the Arcs.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ValidationEngine>,
    pub webhooks: Arc<WebhookManager>,
    pub start_time: std::time::SystemTime,
}
