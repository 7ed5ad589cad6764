/*!
 * Webhook Service
 *
 * Manages webhook subscriptions and delivery for the validation engine:
 * registration CRUD, HMAC-SHA256 signed envelopes, per-subscriber event
 * filtering, bounded retries, and an append-only delivery history.
 *
 * Delivery never fails the originating request; failures are recorded and
 * recovered. Subscribers must be idempotent keyed by `delivery_id`.
 */

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::models::{DrugInteraction, Prescription, ValidationResult};
use crate::utils::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
const SUCCESS_CODES: &[u16] = &[200, 201, 202, 204];
const RESPONSE_BODY_LIMIT: usize = 500;

/// Well-known webhook event names. Caller-defined names (test events) ride
/// in the `Custom` variant; the closed set covers everything the engine
/// emits itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PrescriptionBlocked,
    PrescriptionWarning,
    MajorInteraction,
    Contraindication,
    DosingAlert,
    SystemHealth,
    Custom(String),
}

impl WebhookEvent {
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEvent::PrescriptionBlocked => "prescription.blocked",
            WebhookEvent::PrescriptionWarning => "prescription.warning",
            WebhookEvent::MajorInteraction => "interaction.major",
            WebhookEvent::Contraindication => "contraindication.detected",
            WebhookEvent::DosingAlert => "dosing.alert",
            WebhookEvent::SystemHealth => "system.health",
            WebhookEvent::Custom(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "prescription.blocked" => WebhookEvent::PrescriptionBlocked,
            "prescription.warning" => WebhookEvent::PrescriptionWarning,
            "interaction.major" => WebhookEvent::MajorInteraction,
            "contraindication.detected" => WebhookEvent::Contraindication,
            "dosing.alert" => WebhookEvent::DosingAlert,
            "system.health" => WebhookEvent::SystemHealth,
            other => WebhookEvent::Custom(other.to_string()),
        }
    }
}

/// Webhook delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Retrying => "retrying",
        }
    }

    /// Strict parse from a wire token
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "pending" => Ok(DeliveryStatus::Pending),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "retrying" => Ok(DeliveryStatus::Retrying),
            _ => Err(AppError::InvalidArgument(format!(
                "Unknown delivery status: {}",
                token
            ))),
        }
    }
}

fn default_active() -> bool {
    true
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    60
}

/// Webhook endpoint subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    pub secret: String,
    /// Subscribed event names, or "*" for everything
    pub events: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
}

impl WebhookSubscription {
    fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event || e == "*")
    }
}

/// Partial update for a subscription
#[derive(Debug, Default, Deserialize)]
pub struct WebhookUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub active: Option<bool>,
    pub headers: Option<HashMap<String, String>>,
    pub retry_count: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
}

/// Subscription listing row with the secret masked
#[derive(Debug, Serialize)]
pub struct WebhookSummary {
    pub id: String,
    pub name: String,
    pub url: String,
    pub secret: Option<String>,
    pub events: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Record of one webhook delivery (all attempts of one send)
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDelivery {
    pub id: String,
    pub subscription_id: String,
    pub event: String,
    /// The full signed envelope as sent
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Delivery history query filters
#[derive(Debug, Default, Deserialize)]
pub struct DeliveryHistoryFilter {
    pub subscription_id: Option<String>,
    pub event: Option<String>,
    pub status: Option<DeliveryStatus>,
    pub limit: Option<usize>,
}

/// Webhook subscription store and delivery pipeline
pub struct WebhookManager {
    subscriptions: Mutex<HashMap<String, WebhookSubscription>>,
    deliveries: Mutex<Vec<WebhookDelivery>>,
    client: reqwest::Client,
}

impl WebhookManager {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(Vec::new()),
            client: reqwest::Client::builder()
                .timeout(DELIVERY_TIMEOUT)
                .build()
                .expect("Failed to build webhook HTTP client"),
        }
    }

    // ========================================================================
    // SUBSCRIPTION CRUD
    // ========================================================================

    /// Register a new subscription. An empty id gets a generated one; an
    /// active subscription must carry a non-empty secret.
    pub fn register(&self, mut subscription: WebhookSubscription) -> Result<WebhookSubscription> {
        if subscription.id.is_empty() {
            subscription.id = Uuid::new_v4().to_string();
        }
        if subscription.active && subscription.secret.is_empty() {
            return Err(AppError::InvalidArgument(
                "Active webhook subscription requires a secret".to_string(),
            ));
        }

        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        subscriptions.insert(subscription.id.clone(), subscription.clone());
        tracing::info!("Webhook registered: {} ({})", subscription.name, subscription.id);
        Ok(subscription)
    }

    /// Apply a partial update to an existing subscription
    pub fn update(&self, id: &str, update: WebhookUpdate) -> Result<WebhookSubscription> {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        let subscription = subscriptions
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Webhook {} not found", id)))?;

        if let Some(name) = update.name {
            subscription.name = name;
        }
        if let Some(url) = update.url {
            subscription.url = url;
        }
        if let Some(secret) = update.secret {
            subscription.secret = secret;
        }
        if let Some(events) = update.events {
            subscription.events = events;
        }
        if let Some(active) = update.active {
            subscription.active = active;
        }
        if let Some(headers) = update.headers {
            subscription.headers = headers;
        }
        if let Some(retry_count) = update.retry_count {
            subscription.retry_count = retry_count;
        }
        if let Some(retry_delay) = update.retry_delay_seconds {
            subscription.retry_delay_seconds = retry_delay;
        }

        if subscription.active && subscription.secret.is_empty() {
            return Err(AppError::InvalidArgument(
                "Active webhook subscription requires a secret".to_string(),
            ));
        }

        tracing::info!("Webhook updated: {}", id);
        Ok(subscription.clone())
    }

    /// Delete a subscription
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        if subscriptions.remove(id).is_none() {
            return Err(AppError::NotFound(format!("Webhook {} not found", id)));
        }
        tracing::info!("Webhook deleted: {}", id);
        Ok(())
    }

    /// Get one subscription by id
    pub fn get(&self, id: &str) -> Result<WebhookSubscription> {
        let subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        subscriptions
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Webhook {} not found", id)))
    }

    /// List all subscriptions with secrets masked
    pub fn list(&self) -> Vec<WebhookSummary> {
        let subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
        let mut summaries: Vec<WebhookSummary> = subscriptions
            .values()
            .map(|s| WebhookSummary {
                id: s.id.clone(),
                name: s.name.clone(),
                url: s.url.clone(),
                secret: if s.secret.is_empty() {
                    None
                } else {
                    Some(format!("{}...", s.secret.chars().take(8).collect::<String>()))
                },
                events: s.events.clone(),
                active: s.active,
                created_at: s.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    // ========================================================================
    // SIGNING
    // ========================================================================

    /// HMAC-SHA256 signature over a serialized envelope, hex-encoded
    pub fn sign(payload: &str, secret: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time signature verification
    pub fn verify_signature(payload: &str, signature: &str, secret: &str) -> bool {
        let Ok(expected) = hex::decode(signature) else {
            return false;
        };
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    // ========================================================================
    // DELIVERY
    // ========================================================================

    /// Send one event to one subscription with bounded retries.
    pub async fn send(
        &self,
        subscription: &WebhookSubscription,
        event: &WebhookEvent,
        data: serde_json::Value,
    ) -> WebhookDelivery {
        let delivery_id = format!(
            "del-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            subscription.id
        );

        // Envelope serialization relies on serde_json's sorted map keys so
        // the signature is stable for a given envelope.
        let envelope = serde_json::json!({
            "event": event.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
            "delivery_id": delivery_id,
            "data": data,
        });
        let body = serde_json::to_string(&envelope).expect("envelope serializes");
        let signature = Self::sign(&body, &subscription.secret);

        let mut delivery = WebhookDelivery {
            id: delivery_id.clone(),
            subscription_id: subscription.id.clone(),
            event: event.as_str().to_string(),
            payload: envelope,
            status: DeliveryStatus::Pending,
            attempts: 0,
            last_attempt: None,
            response_code: None,
            response_body: None,
            created_at: Utc::now(),
        };

        let max_attempts = subscription.retry_count.max(1);
        for attempt in 1..=max_attempts {
            delivery.attempts = attempt;
            delivery.last_attempt = Some(Utc::now());

            let mut request = self
                .client
                .post(&subscription.url)
                .header("Content-Type", "application/json")
                .header("X-Webhook-Signature", &signature)
                .header("X-Webhook-Event", event.as_str())
                .header("X-Webhook-Delivery", &delivery_id)
                .body(body.clone());
            for (key, value) in &subscription.headers {
                request = request.header(key.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) => {
                    let code = response.status().as_u16();
                    delivery.response_code = Some(code);
                    let text = response.text().await.unwrap_or_default();
                    delivery.response_body =
                        (!text.is_empty()).then(|| truncate(&text, RESPONSE_BODY_LIMIT));

                    if SUCCESS_CODES.contains(&code) {
                        delivery.status = DeliveryStatus::Delivered;
                        tracing::info!(
                            "Webhook delivered: {} to {}",
                            delivery_id,
                            subscription.url
                        );
                        break;
                    }
                    delivery.status = DeliveryStatus::Retrying;
                    tracing::warn!("Webhook failed (attempt {}): {}", attempt, code);
                }
                Err(e) => {
                    delivery.status = DeliveryStatus::Retrying;
                    delivery.response_body = Some(truncate(&e.to_string(), RESPONSE_BODY_LIMIT));
                    tracing::error!("Webhook error (attempt {}): {}", attempt, e);
                }
            }

            // No sleep after the final attempt
            if attempt < max_attempts {
                tokio::time::sleep(Duration::from_secs(subscription.retry_delay_seconds)).await;
            }
        }

        if delivery.status == DeliveryStatus::Retrying {
            delivery.status = DeliveryStatus::Failed;
            tracing::error!(
                "Webhook delivery failed after {} attempts: {}",
                max_attempts,
                delivery_id
            );
        }

        self.deliveries
            .lock()
            .expect("delivery lock poisoned")
            .push(delivery.clone());
        delivery
    }

    /// Trigger an event: deliver to every active subscription whose event
    /// list matches. Deliveries to different subscribers run concurrently.
    pub async fn trigger(
        &self,
        event: &WebhookEvent,
        data: serde_json::Value,
    ) -> Vec<WebhookDelivery> {
        let targets: Vec<WebhookSubscription> = {
            let subscriptions = self.subscriptions.lock().expect("subscription lock poisoned");
            subscriptions
                .values()
                .filter(|s| s.active && s.subscribes_to(event.as_str()))
                .cloned()
                .collect()
        };

        let sends = targets
            .iter()
            .map(|subscription| self.send(subscription, event, data.clone()));
        join_all(sends).await
    }

    /// Alert for a blocked prescription: the main entry point for
    /// downstream notification.
    pub async fn send_blocked_prescription_alert(
        &self,
        prescription: &Prescription,
        result: &ValidationResult,
        reason: &str,
    ) -> Vec<WebhookDelivery> {
        let interactions: Vec<serde_json::Value> = result
            .interactions
            .iter()
            .map(|i| {
                serde_json::json!({
                    "drug1": i.drug1_name,
                    "drug2": i.drug2_name,
                    "severity": i.severity,
                    "management": i.management,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "prescription_id": prescription.id,
            "status": "BLOCKED",
            "reason": reason,
            "pharmacy_id": prescription.pharmacy_id,
            "prescriber_id": prescription.prescriber_id,
            "blocked_at": Utc::now().to_rfc3339(),
            "details": {
                "interactions": interactions,
                "contraindications": result.contraindications,
            },
            "action_required": true,
            "severity": "HIGH",
        });

        self.trigger(&WebhookEvent::PrescriptionBlocked, payload).await
    }

    /// Alert for a detected major drug interaction
    pub async fn send_major_interaction_alert(
        &self,
        prescription_id: &str,
        interaction: &DrugInteraction,
    ) -> Vec<WebhookDelivery> {
        let payload = serde_json::json!({
            "prescription_id": prescription_id,
            "interaction": {
                "drug1": interaction.drug1_name,
                "drug2": interaction.drug2_name,
                "severity": interaction.severity,
                "mechanism": interaction.mechanism,
                "management": interaction.management,
            },
            "detected_at": Utc::now().to_rfc3339(),
        });

        self.trigger(&WebhookEvent::MajorInteraction, payload).await
    }

    /// Delivery history, most recent first, with optional filters
    pub fn delivery_history(&self, filter: &DeliveryHistoryFilter) -> Vec<WebhookDelivery> {
        let deliveries = self.deliveries.lock().expect("delivery lock poisoned");
        let mut filtered: Vec<WebhookDelivery> = deliveries
            .iter()
            .filter(|d| {
                filter
                    .subscription_id
                    .as_ref()
                    .is_none_or(|id| &d.subscription_id == id)
                    && filter.event.as_ref().is_none_or(|e| &d.event == e)
                    && filter.status.is_none_or(|s| d.status == s)
            })
            .cloned()
            .collect();

        filtered.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        filtered.truncate(filter.limit.unwrap_or(100));
        filtered
    }
}

impl Default for WebhookManager {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription(id: &str, events: &[&str]) -> WebhookSubscription {
        WebhookSubscription {
            id: id.to_string(),
            name: "Test Subscriber".to_string(),
            url: "http://127.0.0.1:9/hook".to_string(),
            secret: "test-secret".to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            active: true,
            created_at: Utc::now(),
            headers: HashMap::new(),
            retry_count: 3,
            retry_delay_seconds: 60,
        }
    }

    #[test]
    fn test_register_requires_secret_when_active() {
        let manager = WebhookManager::new();
        let mut sub = subscription("hook-1", &["*"]);
        sub.secret = String::new();
        assert!(matches!(
            manager.register(sub),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_register_generates_id() {
        let manager = WebhookManager::new();
        let mut sub = subscription("", &["*"]);
        sub.id = String::new();
        let registered = manager.register(sub).unwrap();
        assert!(!registered.id.is_empty());
    }

    #[test]
    fn test_update_and_delete() {
        let manager = WebhookManager::new();
        manager.register(subscription("hook-1", &["*"])).unwrap();

        let updated = manager
            .update(
                "hook-1",
                WebhookUpdate {
                    name: Some("Renamed".to_string()),
                    retry_count: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.retry_count, 1);

        manager.delete("hook-1").unwrap();
        assert!(matches!(manager.get("hook-1"), Err(AppError::NotFound(_))));
        assert!(matches!(
            manager.delete("hook-1"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_masks_secret() {
        let manager = WebhookManager::new();
        let mut sub = subscription("hook-1", &["prescription.blocked"]);
        sub.secret = "super-secret-value".to_string();
        manager.register(sub).unwrap();

        let listed = manager.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].secret.as_deref(), Some("super-se..."));
    }

    #[test]
    fn test_event_matching() {
        let wildcard = subscription("a", &["*"]);
        assert!(wildcard.subscribes_to("prescription.blocked"));
        assert!(wildcard.subscribes_to("anything.custom"));

        let narrow = subscription("b", &["interaction.major"]);
        assert!(narrow.subscribes_to("interaction.major"));
        assert!(!narrow.subscribes_to("prescription.blocked"));
    }

    #[test]
    fn test_event_tokens() {
        assert_eq!(
            WebhookEvent::PrescriptionBlocked.as_str(),
            "prescription.blocked"
        );
        assert_eq!(
            WebhookEvent::parse("interaction.major"),
            WebhookEvent::MajorInteraction
        );
        assert_eq!(
            WebhookEvent::parse("webhook.test"),
            WebhookEvent::Custom("webhook.test".to_string())
        );
    }

    #[test]
    fn test_signature_round_trip() {
        let payload = r#"{"data":{},"delivery_id":"del-1","event":"system.health","timestamp":"t"}"#;
        let signature = WebhookManager::sign(payload, "secret-key");
        assert!(WebhookManager::verify_signature(payload, &signature, "secret-key"));
        assert!(!WebhookManager::verify_signature(payload, &signature, "wrong-key"));
        assert!(!WebhookManager::verify_signature(payload, "not-hex", "secret-key"));
    }

    #[test]
    fn test_envelope_serialization_is_stable() {
        let envelope = serde_json::json!({
            "event": "system.health",
            "timestamp": "2026-01-01T00:00:00Z",
            "delivery_id": "del-1",
            "data": {"b": 2, "a": 1},
        });
        let first = serde_json::to_string(&envelope).unwrap();
        let second = serde_json::to_string(&envelope).unwrap();
        assert_eq!(first, second);
        // serde_json maps are BTreeMap-backed: keys serialize sorted
        assert!(first.find("\"data\"").unwrap() < first.find("\"delivery_id\"").unwrap());
        assert!(first.find("\"a\"").unwrap() < first.find("\"b\"").unwrap());
        assert_eq!(
            WebhookManager::sign(&first, "k"),
            WebhookManager::sign(&second, "k")
        );
    }

    #[test]
    fn test_delivery_status_parse() {
        assert_eq!(
            DeliveryStatus::parse("delivered").unwrap(),
            DeliveryStatus::Delivered
        );
        assert!(DeliveryStatus::parse("queued").is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(300);
        let truncated = truncate(&text, RESPONSE_BODY_LIMIT);
        assert!(truncated.len() <= RESPONSE_BODY_LIMIT);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
