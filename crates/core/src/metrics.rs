//! Aggregate counters for whatever exporter the host process runs.
//!
//! Counters are keyed by name plus a sorted label set, so
//! `inc("events", &[("channel", "a")])` and the same call with labels in a
//! different order hit the same slot.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;

// ── Counter names ────────────────────────────────────────────────────

pub const EVENTS: &str = "events";
pub const TRACKS_DISCARDED: &str = "tracks_discarded";
pub const WEBHOOK_DELIVERIES: &str = "webhook_deliveries";
pub const RELAY_TRIGGERS: &str = "relay_triggers";

type LabelSet = Vec<(String, String)>;

/// One counter value with its labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSample {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    pub value: u64,
}

/// Thread-safe monotonically increasing counters.
#[derive(Debug, Default)]
pub struct Counters {
    values: Mutex<BTreeMap<(String, LabelSet), u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, labels: &[(&str, &str)]) -> (String, LabelSet) {
        let mut set: LabelSet = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        set.sort();
        (name.to_string(), set)
    }

    pub fn inc(&self, name: &str, labels: &[(&str, &str)]) {
        self.add(name, labels, 1);
    }

    pub fn add(&self, name: &str, labels: &[(&str, &str)], by: u64) {
        let mut guard = self.values.lock().expect("counters lock poisoned");
        *guard.entry(Self::key(name, labels)).or_insert(0) += by;
    }

    /// Current value, zero if never incremented.
    pub fn get(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let guard = self.values.lock().expect("counters lock poisoned");
        guard.get(&Self::key(name, labels)).copied().unwrap_or(0)
    }

    /// Sum of a counter across every label combination.
    pub fn total(&self, name: &str) -> u64 {
        let guard = self.values.lock().expect("counters lock poisoned");
        guard
            .iter()
            .filter(|((n, _), _)| n == name)
            .map(|(_, v)| *v)
            .sum()
    }

    pub fn snapshot(&self) -> Vec<CounterSample> {
        let guard = self.values.lock().expect("counters lock poisoned");
        guard
            .iter()
            .map(|((name, labels), value)| CounterSample {
                name: name.clone(),
                labels: labels.iter().cloned().collect(),
                value: *value,
            })
            .collect()
    }
}
