//! Ordered condition → action rules with per-(rule, channel) anti-flood.
//!
//! Rules are scanned front-to-back in registration order; the first rule
//! whose conditions all hold decides the actions. When none holds the
//! configured default actions apply.

mod anti_flood;
mod conditions;

#[cfg(test)]
mod tests;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use platewatch_core::config::RulesConfig;
use platewatch_core::{ConsolidatedEvent, EngineError, ListType};

use crate::schedule::ActivityWindow;
use crate::schema::{Rule, RuleAction};
use crate::watchlist::ListMatch;

use anti_flood::AntiFlood;
use conditions::conditions_hold;

// ── Decision ────────────────────────────────────────────────────────

/// Outcome of evaluating one event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Matched rule, or `None` when default actions applied.
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub actions: RuleAction,
    pub list_match: Option<ListMatch>,
    /// The rule matched but is cooling down; `actions` is empty.
    pub suppressed_by_anti_flood: bool,
}

impl Decision {
    pub fn list_type(&self) -> Option<ListType> {
        self.list_match.as_ref().map(|m| m.list_type)
    }

    pub fn is_default(&self) -> bool {
        self.rule_id.is_none()
    }
}

// ── Rule set ────────────────────────────────────────────────────────

pub(crate) struct CompiledRule {
    pub(crate) rule: Rule,
    pub(crate) window: Option<Arc<dyn ActivityWindow>>,
}

impl CompiledRule {
    fn compile(rule: Rule) -> Result<Self, EngineError> {
        if let Some(min) = rule.conditions.min_confidence {
            if !(0.0..=1.0).contains(&min) {
                return Err(EngineError::Configuration(format!(
                    "rule '{}': min_confidence {min} outside [0, 1]",
                    rule.id
                )));
            }
        }
        let window = rule
            .conditions
            .schedule
            .as_ref()
            .map(|s| s.compile())
            .transpose()?;
        Ok(Self { rule, window })
    }
}

/// Rules in registration order.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Ids must be unique.
    pub fn register_rule(&mut self, rule: Rule) -> Result<(), EngineError> {
        if self.rules.iter().any(|r| r.rule.id == rule.id) {
            return Err(EngineError::Configuration(format!(
                "duplicate rule id: {}",
                rule.id
            )));
        }
        self.rules.push(CompiledRule::compile(rule)?);
        Ok(())
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> Result<Rule, EngineError> {
        let idx = self
            .rules
            .iter()
            .position(|r| r.rule.id == rule_id)
            .ok_or_else(|| EngineError::not_found("rule", rule_id))?;
        Ok(self.rules.remove(idx).rule)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().map(|r| &r.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn first_match(
        &self,
        event: &ConsolidatedEvent,
        list_match: Option<&ListMatch>,
        at: DateTime<Utc>,
    ) -> Option<&CompiledRule> {
        self.rules
            .iter()
            .find(|r| conditions_hold(r, event, list_match, at))
    }
}

// ── Rule evaluator ──────────────────────────────────────────────────

/// Thread-safe rule evaluation shared across channels.
pub struct RuleEvaluator {
    rules: RwLock<RuleSet>,
    default_actions: RuleAction,
    anti_flood: AntiFlood,
}

impl RuleEvaluator {
    pub fn new(default_actions: RuleAction) -> Self {
        Self {
            rules: RwLock::new(RuleSet::new()),
            default_actions,
            anti_flood: AntiFlood::default(),
        }
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self, EngineError> {
        Ok(Self::new(RuleAction::from_names(&config.default_actions)?))
    }

    pub fn default_actions(&self) -> RuleAction {
        self.default_actions
    }

    pub fn register_rule(&self, rule: Rule) -> Result<(), EngineError> {
        let mut rules = self.rules.write().expect("rule set lock poisoned");
        let (id, name) = (rule.id.clone(), rule.name.clone());
        rules.register_rule(rule)?;
        info!(rule_id = %id, name = %name, position = rules.len() - 1, "registered rule");
        Ok(())
    }

    pub fn remove_rule(&self, rule_id: &str) -> Result<Rule, EngineError> {
        let removed = self
            .rules
            .write()
            .expect("rule set lock poisoned")
            .remove_rule(rule_id)?;
        self.anti_flood.forget_rule(rule_id);
        Ok(removed)
    }

    /// Snapshot of registered rules in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        let rules = self.rules.read().expect("rule set lock poisoned");
        rules.rules().cloned().collect()
    }

    /// Select actions for `event` given its watch-list resolution.
    ///
    /// A matching rule under anti-flood cooldown still decides the event
    /// (no fall-through to later rules or defaults) but yields no actions.
    pub fn evaluate(
        &self,
        event: &ConsolidatedEvent,
        list_match: Option<&ListMatch>,
        at: DateTime<Utc>,
    ) -> Decision {
        let rules = self.rules.read().expect("rule set lock poisoned");
        let Some(matched) = rules.first_match(event, list_match, at) else {
            debug!(event_id = %event.id, channel_id = %event.channel_id, "no rule matched, default actions");
            return Decision {
                rule_id: None,
                rule_name: None,
                actions: self.default_actions,
                list_match: list_match.cloned(),
                suppressed_by_anti_flood: false,
            };
        };

        let rule = &matched.rule;
        let allowed = match rule.conditions.anti_flood_seconds {
            Some(window) if window > 0 => {
                self.anti_flood.try_fire(&rule.id, &event.channel_id, window, at)
            }
            _ => true,
        };

        if allowed {
            debug!(event_id = %event.id, rule_id = %rule.id, "rule matched");
        } else {
            info!(
                event_id = %event.id,
                rule_id = %rule.id,
                channel_id = %event.channel_id,
                "rule suppressed by anti-flood"
            );
        }

        Decision {
            rule_id: Some(rule.id.clone()),
            rule_name: Some(rule.name.clone()),
            actions: if allowed { rule.actions } else { RuleAction::none() },
            list_match: list_match.cloned(),
            suppressed_by_anti_flood: !allowed,
        }
    }
}
