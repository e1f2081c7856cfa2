//! I/O seams and shared error types.

use platewatch_core::EngineError;

use crate::relay::{AlarmRelay, RelayCommand};

/// Errors that can occur while dispatching.
///
/// For webhooks every variant counts as a failed attempt.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Webhook returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Relay driver failed: {0}")]
    Relay(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A signed webhook request ready to send.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    /// Extra headers; `Content-Type` is set by the transport.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Any HTTP response, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends webhook requests.
///
/// Returns `Ok` for every response the endpoint produced, including
/// non-2xx; `Err` only when no response arrived.
#[async_trait::async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, NotifyError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "http"
    }
}

/// Performs the physical I/O for a relay.
#[async_trait::async_trait]
pub trait RelayDriver: Send + Sync {
    /// Issue `commands` in order. Each command's `after_ms` is measured
    /// from the start of the sequence.
    async fn execute(&self, relay: &AlarmRelay, commands: &[RelayCommand]) -> Result<(), NotifyError>;
}
