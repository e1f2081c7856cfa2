use platewatch_core::EngineError;
use platewatch_notify::NotifyError;
use platewatch_rules::loader::RuleError;

/// Errors raised while assembling the pipeline. All are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to load configuration documents: {0}")]
    Load(#[from] RuleError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}
