//! Sliding re-arm window for repeated plate sightings.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

#[derive(Debug, Default)]
struct SuppressorState {
    last_seen: HashMap<String, DateTime<Utc>>,
    last_sweep: Option<DateTime<Utc>>,
}

/// Remembers when each normalized plate last produced an event.
///
/// A sighting within `window` of the recorded time is a duplicate and does
/// not move the recorded time. A later sighting re-arms the window. Entries
/// older than the window are swept at most once per window so memory stays
/// bounded by the plates seen in roughly the last two windows.
#[derive(Debug)]
pub struct DuplicateSuppressor {
    window: Duration,
    state: Mutex<SuppressorState>,
}

impl DuplicateSuppressor {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window: Duration::seconds(window_seconds as i64),
            state: Mutex::new(SuppressorState::default()),
        }
    }

    /// Returns `true` when `plate` was already emitted within the window.
    pub fn check(&self, plate: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().expect("suppressor lock poisoned");
        self.sweep(&mut state, now);

        match state.last_seen.get(plate) {
            Some(last) if now.signed_duration_since(*last) <= self.window => {
                debug!(plate, "duplicate plate suppressed");
                true
            }
            _ => {
                state.last_seen.insert(plate.to_string(), now);
                false
            }
        }
    }

    fn sweep(&self, state: &mut SuppressorState, now: DateTime<Utc>) {
        let due = state
            .last_sweep
            .map_or(true, |at| now.signed_duration_since(at) >= self.window);
        if !due {
            return;
        }
        let window = self.window;
        state
            .last_seen
            .retain(|_, seen| now.signed_duration_since(*seen) <= window);
        state.last_sweep = Some(now);
    }

    /// Number of plates currently remembered.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("suppressor lock poisoned")
            .last_seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn sliding_window_re_arms() {
        let s = DuplicateSuppressor::new(5);
        assert!(!s.check("AB123", t(0)));
        assert!(s.check("AB123", t(3)));
        assert!(!s.check("AB123", t(6)));
        // Window now measured from t=6.
        assert!(s.check("AB123", t(11)));
        assert!(!s.check("AB123", t(12)));
    }

    #[test]
    fn boundary_is_inclusive() {
        let s = DuplicateSuppressor::new(5);
        assert!(!s.check("AB123", t(0)));
        assert!(s.check("AB123", t(5)));
    }

    #[test]
    fn duplicate_does_not_extend_window() {
        let s = DuplicateSuppressor::new(5);
        assert!(!s.check("AB123", t(0)));
        assert!(s.check("AB123", t(4)));
        assert!(!s.check("AB123", t(6)));
    }

    #[test]
    fn plates_are_independent() {
        let s = DuplicateSuppressor::new(5);
        assert!(!s.check("AB123", t(0)));
        assert!(!s.check("XY999", t(1)));
        assert!(s.check("XY999", t(2)));
    }

    #[test]
    fn old_entries_are_evicted() {
        let s = DuplicateSuppressor::new(5);
        for i in 0..100 {
            s.check(&format!("P{i}"), t(0));
        }
        assert_eq!(s.len(), 100);
        s.check("LATE", t(60));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn zero_window_only_suppresses_same_instant() {
        let s = DuplicateSuppressor::new(0);
        assert!(!s.check("AB123", t(0)));
        assert!(s.check("AB123", t(0)));
        assert!(!s.check("AB123", t(1)));
    }

    #[test]
    fn concurrent_checks_keep_map_consistent() {
        use std::sync::Arc;
        use std::thread;

        let s = Arc::new(DuplicateSuppressor::new(5));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    let mut fresh = 0;
                    for i in 0..50 {
                        if !s.check(&format!("W{worker}-{i}"), t(0)) {
                            fresh += 1;
                        }
                    }
                    fresh
                })
            })
            .collect();
        let fresh: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(fresh, 400);
        assert_eq!(s.len(), 400);
    }
}
