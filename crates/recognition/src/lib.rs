//! Turns per-frame OCR readings for one track into a single plate string.
//!
//! This crate provides:
//! - `normalize`: canonical plate text (case, separators, look-alike folding)
//! - `consolidate`: best-candidate or per-character weighted voting
//! - `CountryClassifier`: ordered regional pattern templates
//! - `DuplicateSuppressor`: sliding re-arm window per plate
//! - `Postprocessor`: the three stages above behind one call

pub mod consolidate;
pub mod country;
pub mod normalize;
pub mod postprocess;
pub mod suppressor;

pub use consolidate::{consolidate, Consolidation, ConsolidationSettings, DiscardReason};
pub use country::{CountryClassifier, CountryTemplate};
pub use normalize::normalize;
pub use postprocess::{PostprocessOutcome, Postprocessor};
pub use suppressor::DuplicateSuppressor;
