//! [`Postprocessor`]: consolidation, classification and duplicate check
//! behind a single call per finalized track.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use platewatch_core::{config::PostprocessConfig, EngineError, OcrCandidate};

use crate::consolidate::{consolidate, ConsolidationSettings, DiscardReason};
use crate::country::CountryClassifier;
use crate::suppressor::DuplicateSuppressor;

/// What the recognition stage concluded about one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostprocessOutcome {
    pub plate: Option<String>,
    pub confidence: f64,
    pub country: Option<String>,
    pub is_duplicate: bool,
    pub reason: Option<DiscardReason>,
}

impl PostprocessOutcome {
    /// Whether an event should be emitted for this track.
    pub fn should_emit(&self) -> bool {
        self.plate.is_some() && !self.is_duplicate
    }
}

/// One instance per process, shared by reference across channel workers.
#[derive(Debug)]
pub struct Postprocessor {
    settings: ConsolidationSettings,
    classifier: CountryClassifier,
    suppressor: DuplicateSuppressor,
}

impl Postprocessor {
    pub fn new(
        settings: ConsolidationSettings,
        classifier: CountryClassifier,
        suppressor: DuplicateSuppressor,
    ) -> Self {
        Self {
            settings,
            classifier,
            suppressor,
        }
    }

    /// Build from configuration. Unknown or malformed templates are fatal.
    pub fn from_config(cfg: &PostprocessConfig) -> Result<Self, EngineError> {
        Ok(Self::new(
            ConsolidationSettings::from(cfg),
            CountryClassifier::from_codes(&cfg.country_templates)?,
            DuplicateSuppressor::new(cfg.anti_duplicate_seconds),
        ))
    }

    pub fn settings(&self) -> &ConsolidationSettings {
        &self.settings
    }

    pub fn classifier(&self) -> &CountryClassifier {
        &self.classifier
    }

    pub fn process(
        &self,
        candidates: &[OcrCandidate],
        frames_with_plate: u32,
        now: DateTime<Utc>,
    ) -> PostprocessOutcome {
        let consolidation = consolidate(candidates, frames_with_plate, &self.settings);

        let Some(plate) = consolidation.plate else {
            debug!(
                reason = consolidation.reason.map(|r| r.as_str()),
                candidates = candidates.len(),
                frames_with_plate,
                "track produced no plate"
            );
            return PostprocessOutcome {
                plate: None,
                confidence: 0.0,
                country: None,
                is_duplicate: false,
                reason: consolidation.reason,
            };
        };

        let country = self.classifier.classify(&plate).map(str::to_string);
        let is_duplicate = self.suppressor.check(&plate, now);

        debug!(
            plate = %plate,
            confidence = consolidation.confidence,
            country = country.as_deref().unwrap_or("-"),
            is_duplicate,
            "track consolidated"
        );

        PostprocessOutcome {
            plate: Some(plate),
            confidence: consolidation.confidence,
            country,
            is_duplicate,
            reason: is_duplicate.then_some(DiscardReason::Duplicate),
        }
    }
}
