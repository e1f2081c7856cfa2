//! Multi-frame candidate consolidation.
//!
//! Pure function of its inputs: no clock, no shared state. Duplicate
//! suppression happens later in [`crate::suppressor`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use platewatch_core::{config::PostprocessConfig, OcrCandidate};

use crate::normalize::{compact, normalize};

/// Why a track produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    NotEnoughFrames,
    LowConfidence,
    /// Winning text normalized to an empty string.
    Unreadable,
    Duplicate,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::NotEnoughFrames => "not_enough_frames",
            DiscardReason::LowConfidence => "low_confidence",
            DiscardReason::Unreadable => "unreadable",
            DiscardReason::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsolidationSettings {
    pub vote_by_char: bool,
    pub min_confidence: f64,
    pub min_frames_for_event: u32,
}

impl From<&PostprocessConfig> for ConsolidationSettings {
    fn from(cfg: &PostprocessConfig) -> Self {
        Self {
            vote_by_char: cfg.vote_by_char,
            min_confidence: cfg.min_confidence,
            min_frames_for_event: cfg.min_frames_for_event,
        }
    }
}

/// Result of consolidating one track's candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct Consolidation {
    /// Normalized plate, `None` when no event should be emitted.
    pub plate: Option<String>,
    /// Zero whenever `plate` is `None`.
    pub confidence: f64,
    pub reason: Option<DiscardReason>,
}

impl Consolidation {
    fn discarded(reason: DiscardReason) -> Self {
        Self {
            plate: None,
            confidence: 0.0,
            reason: Some(reason),
        }
    }
}

/// Merge a track's OCR candidates into one normalized plate string.
pub fn consolidate(
    candidates: &[OcrCandidate],
    frames_with_plate: u32,
    settings: &ConsolidationSettings,
) -> Consolidation {
    if frames_with_plate < settings.min_frames_for_event {
        return Consolidation::discarded(DiscardReason::NotEnoughFrames);
    }

    let eligible: Vec<&OcrCandidate> = candidates
        .iter()
        .filter(|c| c.confidence >= settings.min_confidence)
        .collect();
    if eligible.is_empty() {
        return Consolidation::discarded(DiscardReason::LowConfidence);
    }

    let (text, confidence) = if settings.vote_by_char {
        vote_by_char(&eligible)
    } else {
        best_candidate(&eligible)
    };

    // Folding happens after the vote so look-alike readings still compete
    // as distinct glyphs.
    let plate = normalize(&text);
    if plate.is_empty() {
        return Consolidation::discarded(DiscardReason::Unreadable);
    }

    Consolidation {
        plate: Some(plate),
        confidence,
        reason: None,
    }
}

/// Per-position confidence-weighted vote.
///
/// Each position's winner is the glyph with the greatest summed confidence,
/// ties going to the glyph seen first at that position. A position
/// contributes its winner's weight divided by the candidate count; the
/// overall confidence is the mean over the longest candidate's length, so
/// positions only some candidates reach pull the score down.
fn vote_by_char(candidates: &[&OcrCandidate]) -> (String, f64) {
    let texts: Vec<Vec<char>> = candidates
        .iter()
        .map(|c| compact(&c.text).chars().collect())
        .collect();
    let max_len = texts.iter().map(Vec::len).max().unwrap_or(0);
    if max_len == 0 {
        return (String::new(), 0.0);
    }

    let n = candidates.len() as f64;
    let mut voted = String::with_capacity(max_len);
    let mut contribution = 0.0;

    for idx in 0..max_len {
        let mut tally: IndexMap<char, f64> = IndexMap::new();
        for (text, candidate) in texts.iter().zip(candidates) {
            if let Some(ch) = text.get(idx) {
                *tally.entry(*ch).or_insert(0.0) += candidate.confidence;
            }
        }

        let mut winner: Option<(char, f64)> = None;
        for (ch, weight) in &tally {
            match winner {
                Some((_, best)) if *weight <= best => {}
                _ => winner = Some((*ch, *weight)),
            }
        }

        if let Some((ch, weight)) = winner {
            voted.push(ch);
            contribution += weight / n;
        }
    }

    (voted, contribution / max_len as f64)
}

/// The single most confident reading, verbatim. First one wins ties.
fn best_candidate(candidates: &[&OcrCandidate]) -> (String, f64) {
    let mut best = candidates[0];
    for candidate in &candidates[1..] {
        if candidate.confidence > best.confidence {
            best = candidate;
        }
    }
    (best.text.clone(), best.confidence)
}
