//! Watch-list resolution followed by rule evaluation.

use chrono::{DateTime, Utc};

use platewatch_core::config::RulesConfig;
use platewatch_core::{ConsolidatedEvent, EngineError};

use crate::evaluator::{Decision, RuleEvaluator};
use crate::watchlist::WatchListResolver;

/// One instance per process, shared by reference across channels.
pub struct DecisionEngine {
    resolver: WatchListResolver,
    evaluator: RuleEvaluator,
}

impl DecisionEngine {
    pub fn new(resolver: WatchListResolver, evaluator: RuleEvaluator) -> Self {
        Self {
            resolver,
            evaluator,
        }
    }

    /// Empty lists and rules with the configured default actions.
    pub fn from_config(config: &RulesConfig) -> Result<Self, EngineError> {
        Ok(Self::new(
            WatchListResolver::new(),
            RuleEvaluator::from_config(config)?,
        ))
    }

    pub fn resolver(&self) -> &WatchListResolver {
        &self.resolver
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// Resolve the event's plate against watch-lists, then pick actions.
    ///
    /// Events without a plate never match a list but are still evaluated.
    pub fn decide(&self, event: &ConsolidatedEvent, at: DateTime<Utc>) -> Decision {
        let list_match = event
            .plate
            .as_deref()
            .and_then(|plate| self.resolver.resolve(plate, &event.channel_id, at));
        self.evaluator.evaluate(event, list_match.as_ref(), at)
    }
}
