//! Watch-list and rule documents with serde deserialization.
//!
//! - `WatchList` / `WatchListItem`: prioritized plate collections
//! - `Rule`: a `RuleCondition` set mapped to a `RuleAction` set
//!
//! Both are plain data. Patterns and schedules are compiled when the
//! documents are registered with the resolver or evaluator.

mod rule;
mod watchlist;

pub use rule::*;
pub use watchlist::*;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
