//! In-memory append-only event log.
//!
//! Every emitted event is recorded with its decision, including events
//! whose actions were suppressed by anti-flood. Entries are never removed.

use std::sync::RwLock;

use serde::Serialize;

use platewatch_core::ConsolidatedEvent;
use platewatch_rules::Decision;

#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    pub event: ConsolidatedEvent,
    pub decision: Decision,
}

#[derive(Debug, Default)]
pub struct EventLog {
    entries: RwLock<Vec<LoggedEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: ConsolidatedEvent, decision: Decision) {
        let mut entries = self.entries.write().expect("event_log lock poisoned");
        entries.push(LoggedEvent { event, decision });
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("event_log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, oldest first.
    pub fn snapshot(&self) -> Vec<LoggedEvent> {
        self.entries.read().expect("event_log lock poisoned").clone()
    }

    /// Up to `limit` entries, newest first, optionally for one channel.
    pub fn recent(&self, channel_id: Option<&str>, limit: usize) -> Vec<LoggedEvent> {
        let entries = self.entries.read().expect("event_log lock poisoned");
        entries
            .iter()
            .rev()
            .filter(|e| channel_id.map_or(true, |c| e.event.channel_id == c))
            .take(limit)
            .cloned()
            .collect()
    }
}
