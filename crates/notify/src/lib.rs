//! Dispatch of decided actions: signed webhooks and alarm relays.
//!
//! This crate provides:
//! - `WebhookTransport` / `RelayDriver` traits for the I/O seams
//! - `HttpTransport`: reqwest-backed transport with a bounded timeout
//! - `WebhookDelivery`: retry state machine with exponential backoff
//! - `WebhookService`: subscription fan-out, signing, and the retry tick
//! - `RelayController`: per-relay mode state machine with debounce

pub mod delivery;
pub mod dispatcher;
pub mod relay;
pub mod signing;
pub mod subscription;
pub mod traits;
pub mod webhook;

pub use delivery::{DeliveryStatus, RetryPolicy, WebhookDelivery};
pub use dispatcher::{WebhookService, WebhookServiceSummary};
pub use relay::{AlarmRelay, LoggingRelayDriver, RelayCommand, RelayController, RelayOutcome, RelaySpec, RelayState};
pub use subscription::{SubscriptionFilters, WebhookSubscription};
pub use traits::{NotifyError, RelayDriver, WebhookRequest, WebhookResponse, WebhookTransport};
pub use webhook::HttpTransport;
