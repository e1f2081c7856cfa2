//! Error type for configuration loading.

use platewatch_core::EngineError;

/// Errors that can occur while loading list and rule documents.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Document-level validation error (e.g. duplicate IDs).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rejected by the resolver or evaluator (bad regex, bad schedule).
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result alias for loader operations.
pub type Result<T> = std::result::Result<T, RuleError>;
