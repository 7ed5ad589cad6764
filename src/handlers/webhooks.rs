/*!
 * Webhook HTTP Handlers
 *
 * Handles HTTP requests for webhook subscription management, test
 * deliveries, and delivery history queries.
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::{
    handlers::AppState,
    services::{DeliveryHistoryFilter, WebhookEvent, WebhookSubscription, WebhookUpdate},
    utils::Result,
};

/// Register a new webhook subscription
///
/// POST /api/v1/webhooks
///
/// Request body:
/// ```json
/// {
///   "name": "Pharmacy Dispatch",
///   "url": "https://dispatch.example.com/hooks/rxgate",
///   "secret": "shared-secret",
///   "events": ["prescription.blocked", "interaction.major"]
/// }
/// ```
pub async fn register_webhook(
    State(state): State<AppState>,
    Json(subscription): Json<WebhookSubscription>,
) -> Result<impl IntoResponse> {
    let registered = state.webhooks.register(subscription)?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// Update an existing webhook subscription
///
/// PUT /api/v1/webhooks/{id}
pub async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<WebhookUpdate>,
) -> Result<impl IntoResponse> {
    let updated = state.webhooks.update(&id, update)?;
    Ok((StatusCode::OK, Json(updated)))
}

/// Delete a webhook subscription
///
/// DELETE /api/v1/webhooks/{id}
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.webhooks.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all webhook subscriptions (secrets masked)
///
/// GET /api/v1/webhooks
pub async fn list_webhooks(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok((StatusCode::OK, Json(state.webhooks.list())))
}

/// Send a test event to one subscription
///
/// POST /api/v1/webhooks/{id}/test
///
/// Delivers a `webhook.test` event directly to the subscription,
/// bypassing its event filter, and returns the delivery record.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let subscription = state.webhooks.get(&id)?;

    let payload = serde_json::json!({
        "message": "RxGate webhook test",
        "sent_at": Utc::now().to_rfc3339(),
    });
    let delivery = state
        .webhooks
        .send(
            &subscription,
            &WebhookEvent::Custom("webhook.test".to_string()),
            payload,
        )
        .await;

    Ok((StatusCode::OK, Json(delivery)))
}

/// Query the delivery history
///
/// GET /api/v1/webhooks/deliveries?subscription_id=&event=&status=&limit=
pub async fn delivery_history(
    State(state): State<AppState>,
    Query(filter): Query<DeliveryHistoryFilter>,
) -> Result<impl IntoResponse> {
    Ok((StatusCode::OK, Json(state.webhooks.delivery_history(&filter))))
}
