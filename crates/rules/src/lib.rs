//! Decision layer: watch-lists, rules, and their YAML configuration.
//!
//! This crate provides:
//! - `schedule`: opaque activity windows shared by lists and rules
//! - `watchlist`: prioritized allow/deny/info lists with item expiry
//! - `evaluator`: ordered condition → action rules with anti-flood cooldown
//! - `DecisionEngine`: resolver and evaluator behind one call
//! - `loader`: fail-fast loading of list/rule documents from disk

pub mod engine;
pub mod evaluator;
pub mod loader;
pub mod schedule;
pub mod schema;
pub mod watchlist;

pub use engine::DecisionEngine;
pub use evaluator::{Decision, RuleEvaluator};
pub use schema::{MatchMode, Rule, RuleAction, RuleCondition, WatchList, WatchListItem};
pub use watchlist::{ListMatch, WatchListResolver};
