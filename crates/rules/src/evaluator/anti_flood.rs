//! Per-(rule, channel) cooldown.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

const MAX_WINDOW_SECONDS: u64 = (i64::MAX / 1_000) as u64;

#[derive(Debug, Default)]
struct FloodState {
    /// When each `(rule_id, channel_id)` may fire again.
    reopens_at: HashMap<(String, String), DateTime<Utc>>,
    /// Earliest entry in `reopens_at`; nothing expires before it.
    next_expiry: Option<DateTime<Utc>>,
}

/// Cooldown state per `(rule_id, channel_id)`.
///
/// Only actual fires start a cooldown; suppressed matches do not extend it.
/// Entries whose cooldown has elapsed are swept on the next call that
/// reaches the earliest expiry, so memory stays bounded by the pairs
/// currently cooling down.
#[derive(Debug, Default)]
pub(super) struct AntiFlood {
    state: Mutex<FloodState>,
}

impl AntiFlood {
    /// Returns `true` and starts the cooldown if the rule may fire on this
    /// channel at `at`.
    pub(super) fn try_fire(
        &self,
        rule_id: &str,
        channel_id: &str,
        window_seconds: u64,
        at: DateTime<Utc>,
    ) -> bool {
        let window = Duration::seconds(window_seconds.min(MAX_WINDOW_SECONDS) as i64);
        let mut state = self.state.lock().expect("anti-flood lock poisoned");
        sweep(&mut state, at);

        let key = (rule_id.to_string(), channel_id.to_string());
        if state.reopens_at.get(&key).is_some_and(|reopens| at < *reopens) {
            return false;
        }
        if window <= Duration::zero() {
            return true;
        }
        let reopens = at.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
        state.reopens_at.insert(key, reopens);
        state.next_expiry = Some(state.next_expiry.map_or(reopens, |t| t.min(reopens)));
        true
    }

    pub(super) fn forget_rule(&self, rule_id: &str) {
        let mut state = self.state.lock().expect("anti-flood lock poisoned");
        state.reopens_at.retain(|(rule, _), _| rule != rule_id);
        state.next_expiry = state.reopens_at.values().min().copied();
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.state.lock().expect("anti-flood lock poisoned").reopens_at.len()
    }
}

fn sweep(state: &mut FloodState, now: DateTime<Utc>) {
    if state.next_expiry.map_or(true, |t| now < t) {
        return;
    }
    state.reopens_at.retain(|_, reopens| now < *reopens);
    state.next_expiry = state.reopens_at.values().min().copied();
}
