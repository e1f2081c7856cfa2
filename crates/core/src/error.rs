use thiserror::Error;

/// Failure kinds shared by every engine crate.
///
/// Expected pipeline outcomes (low confidence, duplicates, debounce) are
/// not errors and never appear here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed configuration detected at load time. Fatal.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}
