//! End-to-end wiring: finalized track → consolidated event → decision → dispatch.
//!
//! This crate provides:
//! - `RecognitionPipeline`: the per-track flow plus the periodic tick
//! - `EventLog`: append-only record of emitted events and their decisions
//! - `build_pipeline`: assembly from `Config` and the YAML documents in `RULES_DIR`

pub mod bootstrap;
pub mod error;
pub mod event_log;
pub mod pipeline;

pub use bootstrap::{build_pipeline, RELAYS_FILE, SUBSCRIPTIONS_FILE};
pub use error::PipelineError;
pub use event_log::{EventLog, LoggedEvent};
pub use pipeline::{DispatchReport, RecognitionPipeline, RelayReport, TrackOutcome};
