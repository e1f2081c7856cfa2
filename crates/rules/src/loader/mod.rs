//! Fail-fast loading of watch-list and rule documents from the rules directory.
//!
//! Each document kind lives in its own file (`lists.yaml`, `rules.yaml`, ...)
//! holding a YAML sequence. A missing file means nothing of that kind is
//! configured; anything malformed aborts the load.

mod core;
mod error;


pub use self::core::{ConfigLoader, LISTS_FILE, RULES_FILE};
pub use self::error::{Result, RuleError};
