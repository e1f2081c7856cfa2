//! Webhook delivery records and their retry state machine.
//!
//! ```text
//! pending ──attempt──▶ success
//!    │                    ▲
//!    └─fail─▶ failed ──tick──▶ in_flight ──fail, attempts < max──▶ failed
//!                                  └──────fail, attempts = max──▶ exhausted
//! ```
//!
//! Transitions are driven by explicit calls with an injected `now`; nothing
//! here sleeps or spawns.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use platewatch_core::config::WebhookConfig;

/// Longest response body kept on a delivery record, in characters.
pub const RESPONSE_BODY_LIMIT: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    /// Claimed by a retry tick; not eligible for another claim.
    InFlight,
    Success,
    Failed,
    Exhausted,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Exhausted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InFlight => "in_flight",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Exhausted => "exhausted",
        }
    }
}

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_seconds: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_seconds: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_seconds,
        }
    }

    /// Delay before the next attempt after `attempts` failures:
    /// `backoff_seconds * 2^(attempts - 1)`, saturating.
    pub fn delay_after(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(32);
        let seconds = self
            .backoff_seconds
            .saturating_mul(1u64 << exponent)
            .min(MAX_DELAY_SECONDS);
        Duration::seconds(seconds as i64)
    }
}

/// Caps the backoff to a value chrono can represent comfortably (~100 years).
const MAX_DELAY_SECONDS: u64 = 100 * 365 * 24 * 3600;

impl From<&WebhookConfig> for RetryPolicy {
    fn from(config: &WebhookConfig) -> Self {
        Self::new(config.max_attempts, config.backoff_seconds)
    }
}

/// One (subscription, event) delivery and its attempt history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub subscription_id: String,
    pub event_id: Uuid,
    pub status: DeliveryStatus,
    pub attempts: u32,
    /// Set only while `status` is `failed`.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub response_code: Option<u16>,
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    pub fn new(subscription_id: impl Into<String>, event_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscription_id: subscription_id.into(),
            event_id,
            status: DeliveryStatus::Pending,
            attempts: 0,
            next_retry_at: None,
            response_code: None,
            response_body: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A failed delivery whose retry time has come.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Failed && self.next_retry_at.is_some_and(|t| t <= now)
    }

    /// Move a due delivery to `in_flight`. Returns `false` if it was not due.
    pub fn claim(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.status = DeliveryStatus::InFlight;
        self.next_retry_at = None;
        self.updated_at = now;
        true
    }

    fn record_response(&mut self, code: Option<u16>, body: Option<String>) {
        self.response_code = code;
        self.response_body = body.map(|b| truncate(&b));
    }

    /// A 2xx response arrived. No-op on terminal deliveries.
    pub fn record_success(&mut self, code: u16, body: Option<String>, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.attempts += 1;
        self.record_response(Some(code), body);
        self.status = DeliveryStatus::Success;
        self.next_retry_at = None;
        self.updated_at = now;
    }

    /// A non-2xx response, transport error, or timeout. No-op on terminal
    /// deliveries.
    pub fn record_failure(
        &mut self,
        code: Option<u16>,
        body: Option<String>,
        policy: &RetryPolicy,
        now: DateTime<Utc>,
    ) {
        if self.status.is_terminal() {
            return;
        }
        self.attempts = (self.attempts + 1).min(policy.max_attempts);
        self.record_response(code, body);
        if self.attempts < policy.max_attempts {
            self.status = DeliveryStatus::Failed;
            self.next_retry_at = Some(now + policy.delay_after(self.attempts));
        } else {
            self.status = DeliveryStatus::Exhausted;
            self.next_retry_at = None;
        }
        self.updated_at = now;
    }

    /// Give up without another attempt, e.g. when the subscription is gone.
    pub fn abandon(&mut self, reason: &str, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = DeliveryStatus::Exhausted;
        self.next_retry_at = None;
        self.response_body = Some(truncate(reason));
        self.updated_at = now;
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_LIMIT).collect()
}
