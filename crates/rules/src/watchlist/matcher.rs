use regex::{Regex, RegexBuilder};

use platewatch_core::EngineError;
use platewatch_recognition::normalize;

use crate::schema::MatchMode;

/// A compiled item pattern, matched against canonical plate text.
///
/// Regex patterns are not rewritten: a letter class that should also cover
/// `B`, `O`, `I` or `Z` must list `8`, `0`, `1` or `2`.
#[derive(Debug, Clone)]
pub(super) enum ItemMatcher {
    Exact(String),
    Regex(Regex),
}

impl ItemMatcher {
    pub(super) fn compile(mode: MatchMode, pattern: &str) -> Result<Self, EngineError> {
        match mode {
            MatchMode::Exact => {
                let normalized = normalize(pattern);
                if normalized.is_empty() {
                    return Err(EngineError::Configuration(format!(
                        "watch-list pattern '{pattern}' is empty after normalization"
                    )));
                }
                Ok(Self::Exact(normalized))
            }
            MatchMode::Regex => RegexBuilder::new(&format!("^(?:{pattern})$"))
                .case_insensitive(true)
                .build()
                .map(Self::Regex)
                .map_err(|e| {
                    EngineError::Configuration(format!("invalid watch-list regex '{pattern}': {e}"))
                }),
        }
    }

    pub(super) fn matches(&self, plate: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == plate,
            Self::Regex(re) => re.is_match(plate),
        }
    }
}
