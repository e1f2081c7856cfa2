//! Alarm relay controller.
//!
//! The controller decides whether a trigger goes through (active, not
//! debounced) and which command sequence the relay's mode calls for. A
//! [`RelayDriver`] performs the physical I/O. Triggers on one relay are
//! serialized by a per-relay async mutex held for the whole trigger;
//! different relays proceed independently.

use std::sync::{Arc, RwLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use platewatch_core::config::RelayConfig;
use platewatch_core::{EngineError, RelayMode};

use crate::traits::{NotifyError, RelayDriver};

// ── Relay model ─────────────────────────────────────────────────────

/// Contact state of a relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    #[default]
    Open,
    Closed,
}

impl RelayState {
    pub fn flipped(self) -> Self {
        match self {
            RelayState::Open => RelayState::Closed,
            RelayState::Closed => RelayState::Open,
        }
    }
}

/// One step of a trigger sequence. `after_ms` is measured from the start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayCommand {
    pub state: RelayState,
    pub after_ms: u64,
}

impl RelayCommand {
    fn at(state: RelayState, after_ms: u64) -> Self {
        Self { state, after_ms }
    }
}

/// Command sequence for one trigger of a relay in `mode`.
pub fn plan_commands(mode: RelayMode, current: RelayState, delay_ms: u64) -> Vec<RelayCommand> {
    use RelayState::{Closed, Open};
    match mode {
        RelayMode::Toggle => vec![RelayCommand::at(current.flipped(), 0)],
        RelayMode::CloseOpen => vec![RelayCommand::at(Closed, 0), RelayCommand::at(Open, delay_ms)],
        RelayMode::OpenClose => vec![RelayCommand::at(Open, 0), RelayCommand::at(Closed, delay_ms)],
        RelayMode::HoldClose => vec![RelayCommand::at(Closed, 0)],
        RelayMode::HoldOpen => vec![RelayCommand::at(Open, 0)],
    }
}

/// Configuration form of a relay. Unset fields take controller defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySpec {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub mode: Option<RelayMode>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
    #[serde(default)]
    pub debounce_ms: Option<u64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl RelaySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            channel_id: None,
            mode: None,
            delay_ms: None,
            debounce_ms: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmRelay {
    pub id: String,
    pub name: String,
    pub channel_id: Option<String>,
    pub mode: RelayMode,
    pub delay_ms: u64,
    pub debounce_ms: u64,
    pub is_active: bool,
    pub state: RelayState,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl AlarmRelay {
    fn debounced_at(&self, now: DateTime<Utc>) -> bool {
        let window = Duration::milliseconds(self.debounce_ms.min(i64::MAX as u64 / 1_000_000) as i64);
        self.last_triggered_at
            .is_some_and(|last| now.signed_duration_since(last) < window)
    }
}

/// Result of a trigger call. Only `Executed` issued commands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelayOutcome {
    Executed {
        relay: AlarmRelay,
        commands: Vec<RelayCommand>,
    },
    /// Within `debounce_ms` of the last trigger; relay unchanged.
    Debounced { relay: AlarmRelay },
    Inactive { relay: AlarmRelay },
}

impl RelayOutcome {
    pub fn relay(&self) -> &AlarmRelay {
        match self {
            RelayOutcome::Executed { relay, .. }
            | RelayOutcome::Debounced { relay }
            | RelayOutcome::Inactive { relay } => relay,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, RelayOutcome::Executed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Executed { .. } => "executed",
            RelayOutcome::Debounced { .. } => "debounced",
            RelayOutcome::Inactive { .. } => "inactive",
        }
    }
}

// ── Drivers ─────────────────────────────────────────────────────────

/// Driver that only logs each command at its scheduled offset.
#[derive(Debug, Default, Clone)]
pub struct LoggingRelayDriver;

#[async_trait::async_trait]
impl RelayDriver for LoggingRelayDriver {
    async fn execute(&self, relay: &AlarmRelay, commands: &[RelayCommand]) -> Result<(), NotifyError> {
        let mut elapsed = 0;
        for command in commands {
            if command.after_ms > elapsed {
                tokio::time::sleep(StdDuration::from_millis(command.after_ms - elapsed)).await;
                elapsed = command.after_ms;
            }
            info!(relay_id = %relay.id, state = ?command.state, after_ms = command.after_ms, "relay command");
        }
        Ok(())
    }
}

// ── Controller ──────────────────────────────────────────────────────

struct RelaySlot {
    channel_id: Option<String>,
    relay: Arc<Mutex<AlarmRelay>>,
}

pub struct RelayController {
    default_mode: RelayMode,
    default_debounce_ms: u64,
    driver: Arc<dyn RelayDriver>,
    relays: RwLock<IndexMap<String, RelaySlot>>,
}

impl RelayController {
    pub fn new(config: &RelayConfig, driver: Arc<dyn RelayDriver>) -> Self {
        Self {
            default_mode: config.default_mode,
            default_debounce_ms: config.debounce_ms,
            driver,
            relays: RwLock::new(IndexMap::new()),
        }
    }

    /// Register a relay with a generated id; unset options take defaults.
    pub fn register_relay(
        &self,
        name: &str,
        channel_id: Option<&str>,
        mode: Option<RelayMode>,
        delay_ms: Option<u64>,
        debounce_ms: Option<u64>,
    ) -> Result<AlarmRelay, EngineError> {
        self.add_relay(RelaySpec {
            channel_id: channel_id.map(String::from),
            mode,
            delay_ms,
            debounce_ms,
            ..RelaySpec::new(name)
        })
    }

    pub fn add_relay(&self, spec: RelaySpec) -> Result<AlarmRelay, EngineError> {
        let relay = AlarmRelay {
            id: spec.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            name: spec.name,
            channel_id: spec.channel_id,
            mode: spec.mode.unwrap_or(self.default_mode),
            delay_ms: spec.delay_ms.unwrap_or(0),
            debounce_ms: spec.debounce_ms.unwrap_or(self.default_debounce_ms),
            is_active: spec.is_active,
            state: RelayState::default(),
            last_triggered_at: None,
        };
        let mut relays = self.relays.write().expect("relay map lock poisoned");
        if relays.contains_key(&relay.id) {
            return Err(EngineError::Configuration(format!(
                "duplicate relay id: {}",
                relay.id
            )));
        }
        info!(
            relay_id = %relay.id,
            channel_id = ?relay.channel_id,
            mode = %relay.mode,
            debounce_ms = relay.debounce_ms,
            "registered relay"
        );
        relays.insert(
            relay.id.clone(),
            RelaySlot {
                channel_id: relay.channel_id.clone(),
                relay: Arc::new(Mutex::new(relay.clone())),
            },
        );
        Ok(relay)
    }

    fn handle(&self, relay_id: &str) -> Result<Arc<Mutex<AlarmRelay>>, EngineError> {
        let relays = self.relays.read().expect("relay map lock poisoned");
        relays
            .get(relay_id)
            .map(|slot| slot.relay.clone())
            .ok_or_else(|| EngineError::not_found("relay", relay_id))
    }

    /// Trigger a relay at `now`.
    ///
    /// Unknown ids are `NotFound`. Debounced and inactive relays are
    /// reported in the outcome, not as errors. A driver failure leaves
    /// the relay's state and `last_triggered_at` untouched.
    pub async fn trigger(&self, relay_id: &str, now: DateTime<Utc>) -> Result<RelayOutcome, NotifyError> {
        let handle = self.handle(relay_id)?;
        let mut relay = handle.lock().await;

        if !relay.is_active {
            debug!(relay_id, "relay inactive, trigger ignored");
            return Ok(RelayOutcome::Inactive { relay: relay.clone() });
        }
        if relay.debounced_at(now) {
            debug!(relay_id, debounce_ms = relay.debounce_ms, "relay trigger debounced");
            return Ok(RelayOutcome::Debounced { relay: relay.clone() });
        }

        let commands = plan_commands(relay.mode, relay.state, relay.delay_ms);
        self.driver.execute(&relay, &commands).await?;
        if let Some(last) = commands.last() {
            relay.state = last.state;
        }
        relay.last_triggered_at = Some(now);
        info!(relay_id, mode = %relay.mode, state = ?relay.state, "relay triggered");

        Ok(RelayOutcome::Executed {
            relay: relay.clone(),
            commands,
        })
    }

    /// Trigger every relay bound to `channel_id`, concurrently.
    pub async fn trigger_for_channel(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<(String, Result<RelayOutcome, NotifyError>)> {
        let ids: Vec<String> = {
            let relays = self.relays.read().expect("relay map lock poisoned");
            relays
                .iter()
                .filter(|(_, slot)| slot.channel_id.as_deref() == Some(channel_id))
                .map(|(id, _)| id.clone())
                .collect()
        };
        let triggers = ids.into_iter().map(|id| async move {
            let outcome = self.trigger(&id, now).await;
            (id, outcome)
        });
        join_all(triggers).await
    }

    pub async fn set_active(&self, relay_id: &str, active: bool) -> Result<AlarmRelay, EngineError> {
        let handle = self.handle(relay_id)?;
        let mut relay = handle.lock().await;
        relay.is_active = active;
        Ok(relay.clone())
    }

    pub async fn relay(&self, relay_id: &str) -> Result<AlarmRelay, EngineError> {
        let handle = self.handle(relay_id)?;
        let relay = handle.lock().await;
        Ok(relay.clone())
    }

    /// Snapshot of all relays in registration order.
    pub async fn relays(&self) -> Vec<AlarmRelay> {
        let handles: Vec<Arc<Mutex<AlarmRelay>>> = {
            let relays = self.relays.read().expect("relay map lock poisoned");
            relays.values().map(|slot| slot.relay.clone()).collect()
        };
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests;
