//! Fans events out to webhook subscriptions and drives retries.
//!
//! Each (subscription, event) pair gets its own [`WebhookDelivery`]. The
//! canonical payload is captured once so every retry sends, and signs,
//! identical bytes. The payload is dropped once the delivery is terminal,
//! and terminal records older than the retention window are pruned on the
//! retry tick. Locks are never held across an HTTP call.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use platewatch_core::config::WebhookConfig;
use platewatch_core::{Clock, ConsolidatedEvent, EngineError, ListType};

use crate::delivery::{RetryPolicy, WebhookDelivery};
use crate::signing::sign_payload;
use crate::subscription::{SubscriptionFilters, WebhookSubscription};
use crate::traits::{NotifyError, WebhookRequest, WebhookTransport};

/// Header carrying the event id on every request.
pub const EVENT_ID_HEADER: &str = "X-Event-Id";

/// Number of recent deliveries included in [`WebhookService::describe`].
const RECENT_DELIVERIES: usize = 10;

/// Upper bound on the retention window (~10 years).
const MAX_RETENTION_SECONDS: u64 = 10 * 365 * 24 * 3600;

struct DeliveryEntry {
    delivery: WebhookDelivery,
    /// `None` once the delivery is terminal.
    payload: Option<Arc<Vec<u8>>>,
}

/// Observability snapshot of the service.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookServiceSummary {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
    pub retention_seconds: i64,
    pub signature_header: String,
    pub subscriptions: Vec<WebhookSubscription>,
    pub recent_deliveries: Vec<WebhookDelivery>,
}

/// Webhook subscriptions plus every delivery they produced.
pub struct WebhookService {
    policy: RetryPolicy,
    retention: Duration,
    signature_header: String,
    transport: Arc<dyn WebhookTransport>,
    /// Stamps attempt outcomes with their completion time. Without one the
    /// caller's `now` is used.
    clock: Option<Arc<dyn Clock>>,
    subscriptions: RwLock<IndexMap<String, WebhookSubscription>>,
    deliveries: Mutex<IndexMap<Uuid, DeliveryEntry>>,
}

impl WebhookService {
    pub fn new(config: &WebhookConfig, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            policy: RetryPolicy::from(config),
            retention: Duration::seconds(config.retention_seconds.min(MAX_RETENTION_SECONDS) as i64),
            signature_header: config.signature_header.clone(),
            transport,
            clock: None,
            subscriptions: RwLock::new(IndexMap::new()),
            deliveries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register a new active subscription with a generated id.
    pub fn register_subscription(
        &self,
        name: &str,
        url: &str,
        secret: Option<String>,
        filters: Option<SubscriptionFilters>,
    ) -> Result<WebhookSubscription, EngineError> {
        let mut subscription = WebhookSubscription::new(name, url);
        subscription.secret = secret;
        subscription.filters = filters.unwrap_or_default();
        self.add_subscription(subscription.clone())?;
        Ok(subscription)
    }

    /// Register a fully specified subscription, e.g. one loaded from YAML.
    /// The url must be absolute `http` or `https`.
    pub fn add_subscription(&self, subscription: WebhookSubscription) -> Result<(), EngineError> {
        let url = reqwest::Url::parse(&subscription.url).map_err(|e| {
            EngineError::Configuration(format!(
                "subscription '{}': invalid url '{}': {e}",
                subscription.id, subscription.url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(EngineError::Configuration(format!(
                "subscription '{}': unsupported url scheme '{}' (expected http or https)",
                subscription.id,
                url.scheme()
            )));
        }
        let mut subscriptions = self.subscriptions.write().expect("subscription lock poisoned");
        if subscriptions.contains_key(&subscription.id) {
            return Err(EngineError::Configuration(format!(
                "duplicate subscription id: {}",
                subscription.id
            )));
        }
        tracing::info!(
            subscription_id = %subscription.id,
            name = %subscription.name,
            signed = subscription.signing_secret().is_some(),
            "registered webhook subscription"
        );
        subscriptions.insert(subscription.id.clone(), subscription);
        Ok(())
    }

    /// Stop offering events to a subscription. Its pending retries are
    /// abandoned on their next tick.
    pub fn deactivate_subscription(&self, id: &str) -> Result<WebhookSubscription, EngineError> {
        let mut subscriptions = self.subscriptions.write().expect("subscription lock poisoned");
        let subscription = subscriptions
            .get_mut(id)
            .ok_or_else(|| EngineError::not_found("subscription", id))?;
        subscription.is_active = false;
        tracing::info!(subscription_id = %id, "deactivated webhook subscription");
        Ok(subscription.clone())
    }

    pub fn subscription(&self, id: &str) -> Option<WebhookSubscription> {
        let subscriptions = self.subscriptions.read().expect("subscription lock poisoned");
        subscriptions.get(id).cloned()
    }

    pub fn subscriptions(&self) -> Vec<WebhookSubscription> {
        let subscriptions = self.subscriptions.read().expect("subscription lock poisoned");
        subscriptions.values().cloned().collect()
    }

    // ── Delivery ────────────────────────────────────────────────────

    /// Deliver `event` to every active subscription whose filters accept it.
    ///
    /// Attempts run concurrently. Returns the resulting delivery records.
    pub async fn dispatch(
        &self,
        event: &ConsolidatedEvent,
        list_type: Option<ListType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<WebhookDelivery>, EngineError> {
        let targets: Vec<WebhookSubscription> = {
            let subscriptions = self.subscriptions.read().expect("subscription lock poisoned");
            subscriptions
                .values()
                .filter(|s| s.wants(event, list_type))
                .cloned()
                .collect()
        };
        if targets.is_empty() {
            tracing::debug!(event_id = %event.id, "no webhook subscription wants this event");
            return Ok(Vec::new());
        }

        let payload = Arc::new(event.canonical_payload()?);
        let attempts = targets.iter().map(|subscription| {
            let id = self.create_delivery(subscription, event.id, payload.clone(), now);
            self.attempt(id, subscription, event.id, payload.clone(), now)
        });
        Ok(join_all(attempts).await.into_iter().flatten().collect())
    }

    /// Deliver `event` to one subscription, bypassing its filters.
    ///
    /// An inactive subscription is never contacted: the delivery is recorded
    /// as `exhausted` with zero attempts.
    pub async fn deliver(
        &self,
        subscription_id: &str,
        event: &ConsolidatedEvent,
        now: DateTime<Utc>,
    ) -> Result<WebhookDelivery, EngineError> {
        let subscription = self
            .subscription(subscription_id)
            .ok_or_else(|| EngineError::not_found("subscription", subscription_id))?;
        let payload = Arc::new(event.canonical_payload()?);
        let id = self.create_delivery(&subscription, event.id, payload.clone(), now);
        let delivery = if subscription.is_active {
            self.attempt(id, &subscription, event.id, payload, now).await
        } else {
            tracing::warn!(
                subscription_id = %subscription.id,
                event_id = %event.id,
                "refusing delivery to inactive subscription"
            );
            self.update(id, |d| d.abandon("subscription inactive", now))
        };
        delivery.ok_or_else(|| EngineError::not_found("delivery", id.to_string()))
    }

    /// Retry tick: claim every `failed` delivery due at `now`, then attempt
    /// them concurrently.
    ///
    /// Claimed deliveries are `in_flight` until their attempt finishes, so
    /// an overlapping tick cannot pick them up again. Terminal deliveries
    /// last updated at least one retention window ago are pruned first.
    pub async fn retry_due(&self, now: DateTime<Utc>) -> Vec<WebhookDelivery> {
        let claimed: Vec<(Uuid, String, Uuid, Arc<Vec<u8>>)> = {
            let mut deliveries = self.deliveries.lock().expect("delivery lock poisoned");
            let before = deliveries.len();
            let cutoff = now - self.retention;
            deliveries.retain(|_, entry| {
                !(entry.delivery.status.is_terminal() && entry.delivery.updated_at <= cutoff)
            });
            let pruned = before - deliveries.len();
            if pruned > 0 {
                tracing::debug!(pruned, "pruned expired webhook deliveries");
            }
            deliveries
                .values_mut()
                .filter_map(|entry| {
                    let payload = entry.payload.clone()?;
                    entry.delivery.claim(now).then(|| {
                        (
                            entry.delivery.id,
                            entry.delivery.subscription_id.clone(),
                            entry.delivery.event_id,
                            payload,
                        )
                    })
                })
                .collect()
        };
        if claimed.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = claimed.len(), "retrying due webhook deliveries");

        let retries = claimed
            .into_iter()
            .map(|(id, subscription_id, event_id, payload)| async move {
                match self.subscription(&subscription_id).filter(|s| s.is_active) {
                    Some(subscription) => {
                        self.attempt(id, &subscription, event_id, payload, now).await
                    }
                    None => self.update(id, |d| d.abandon("subscription inactive or removed", now)),
                }
            });
        join_all(retries).await.into_iter().flatten().collect()
    }

    fn create_delivery(
        &self,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        payload: Arc<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Uuid {
        let delivery = WebhookDelivery::new(subscription.id.clone(), event_id, now);
        let id = delivery.id;
        self.deliveries
            .lock()
            .expect("delivery lock poisoned")
            .insert(
                id,
                DeliveryEntry {
                    delivery,
                    payload: Some(payload),
                },
            );
        id
    }

    fn build_request(
        &self,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        payload: &[u8],
    ) -> WebhookRequest {
        let mut headers = vec![(EVENT_ID_HEADER.to_string(), event_id.to_string())];
        if let Some(secret) = subscription.signing_secret() {
            headers.push((self.signature_header.clone(), sign_payload(secret, payload)));
        }
        WebhookRequest {
            url: subscription.url.clone(),
            headers,
            body: payload.to_vec(),
        }
    }

    async fn attempt(
        &self,
        delivery_id: Uuid,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        payload: Arc<Vec<u8>>,
        now: DateTime<Utc>,
    ) -> Option<WebhookDelivery> {
        let request = self.build_request(subscription, event_id, &payload);
        let result = self.transport.send(&request).await;
        let finished = self.clock.as_ref().map_or(now, |c| c.now().max(now));

        let policy = self.policy;
        let Some(delivery) = self.update(delivery_id, |d| match &result {
            Ok(response) if response.is_success() => {
                d.record_success(response.status, Some(response.body.clone()), finished)
            }
            Ok(response) => d.record_failure(
                Some(response.status),
                Some(response.body.clone()),
                &policy,
                finished,
            ),
            Err(e) => d.record_failure(None, Some(e.to_string()), &policy, finished),
        }) else {
            tracing::warn!(
                delivery_id = %delivery_id,
                subscription_id = %subscription.id,
                "delivery record vanished during attempt"
            );
            return None;
        };

        match result {
            Ok(response) if response.is_success() => tracing::info!(
                delivery_id = %delivery.id,
                subscription_id = %subscription.id,
                event_id = %event_id,
                status = response.status,
                attempts = delivery.attempts,
                "webhook delivered"
            ),
            other => {
                let error = match other {
                    Ok(response) => NotifyError::Status {
                        code: response.status,
                        body: response.body,
                    },
                    Err(e) => e,
                };
                tracing::warn!(
                    delivery_id = %delivery.id,
                    subscription_id = %subscription.id,
                    event_id = %event_id,
                    attempts = delivery.attempts,
                    status = delivery.status.as_str(),
                    next_retry_at = ?delivery.next_retry_at,
                    error = %error,
                    "webhook delivery failed"
                );
            }
        }
        Some(delivery)
    }

    /// Apply `f` to a stored delivery and return the updated copy, or `None`
    /// if the record has been pruned. Terminal deliveries release their
    /// payload.
    fn update(&self, id: Uuid, f: impl FnOnce(&mut WebhookDelivery)) -> Option<WebhookDelivery> {
        let mut deliveries = self.deliveries.lock().expect("delivery lock poisoned");
        let entry = deliveries.get_mut(&id)?;
        f(&mut entry.delivery);
        if entry.delivery.status.is_terminal() {
            entry.payload = None;
        }
        Some(entry.delivery.clone())
    }

    #[cfg(test)]
    fn retained_payloads(&self) -> usize {
        let deliveries = self.deliveries.lock().expect("delivery lock poisoned");
        deliveries.values().filter(|e| e.payload.is_some()).count()
    }

    // ── Observability ───────────────────────────────────────────────

    pub fn deliveries(&self) -> Vec<WebhookDelivery> {
        let deliveries = self.deliveries.lock().expect("delivery lock poisoned");
        deliveries.values().map(|e| e.delivery.clone()).collect()
    }

    pub fn delivery(&self, id: Uuid) -> Option<WebhookDelivery> {
        let deliveries = self.deliveries.lock().expect("delivery lock poisoned");
        deliveries.get(&id).map(|e| e.delivery.clone())
    }

    pub fn describe(&self) -> WebhookServiceSummary {
        let deliveries = self.deliveries();
        let skip = deliveries.len().saturating_sub(RECENT_DELIVERIES);
        WebhookServiceSummary {
            max_attempts: self.policy.max_attempts,
            backoff_seconds: self.policy.backoff_seconds,
            retention_seconds: self.retention.num_seconds(),
            signature_header: self.signature_header.clone(),
            subscriptions: self.subscriptions(),
            recent_deliveries: deliveries.into_iter().skip(skip).collect(),
        }
    }
}
