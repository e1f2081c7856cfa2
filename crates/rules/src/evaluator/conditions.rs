//! Rule condition checks against an event and its list resolution.

use chrono::{DateTime, Utc};

use platewatch_core::{ConsolidatedEvent, Direction};

use crate::watchlist::ListMatch;

use super::CompiledRule;

// ── Condition checks ────────────────────────────────────────────────

/// Whether every present condition of `rule` holds. Absent fields match anything.
pub(super) fn conditions_hold(
    rule: &CompiledRule,
    event: &ConsolidatedEvent,
    list_match: Option<&ListMatch>,
    at: DateTime<Utc>,
) -> bool {
    let cond = &rule.rule.conditions;

    // List type requires a resolved list of that type
    if let Some(list_type) = cond.list_type {
        if list_match.map(|m| m.list_type) != Some(list_type) {
            return false;
        }
    }

    if !cond.list_ids.is_empty() {
        match list_match {
            Some(m) if cond.list_ids.contains(&m.list_id) => {}
            _ => return false,
        }
    }

    if !cond.channel_ids.is_empty() && !cond.channel_ids.contains(&event.channel_id) {
        return false;
    }

    if let Some(min) = cond.min_confidence {
        if event.confidence < min {
            return false;
        }
    }

    if let Some(direction) = cond.direction {
        if direction != Direction::Any && event.direction != Some(direction) {
            return false;
        }
    }

    if let Some(min) = cond.min_frames {
        if event.frames_with_plate < min {
            return false;
        }
    }

    // Schedule last: it is the only check that consults the clock
    if let Some(window) = &rule.window {
        if !window.is_active_at(at) {
            return false;
        }
    }

    true
}

// ── Tests ───────────────────────────────────────────────────────────
