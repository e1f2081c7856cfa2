//! Data model shared between recognition, decisioning and dispatch.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// A single per-frame OCR reading. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrCandidate {
    pub text: String,
    /// Reader confidence in `[0, 1]`.
    pub confidence: f64,
}

impl OcrCandidate {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Direction of travel across a channel's field of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Any,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Any => write!(f, "any"),
        }
    }
}

/// Watch-list flavour: allow, deny, or informational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    White,
    Black,
    Info,
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListType::White => write!(f, "white"),
            ListType::Black => write!(f, "black"),
            ListType::Info => write!(f, "info"),
        }
    }
}

/// Physical behaviour of an alarm relay when triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    Toggle,
    CloseOpen,
    OpenClose,
    HoldClose,
    HoldOpen,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayMode::Toggle => "toggle",
            RelayMode::CloseOpen => "close_open",
            RelayMode::OpenClose => "open_close",
            RelayMode::HoldClose => "hold_close",
            RelayMode::HoldOpen => "hold_open",
        };
        f.write_str(s)
    }
}

impl FromStr for RelayMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "toggle" => Ok(RelayMode::Toggle),
            "close_open" => Ok(RelayMode::CloseOpen),
            "open_close" => Ok(RelayMode::OpenClose),
            "hold_close" => Ok(RelayMode::HoldClose),
            "hold_open" => Ok(RelayMode::HoldOpen),
            other => Err(EngineError::Configuration(format!(
                "unknown relay mode: {other}"
            ))),
        }
    }
}

/// Everything the tracking/OCR stage hands over once a track is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedTrack {
    pub track_id: String,
    pub channel_id: String,
    #[serde(default)]
    pub candidates: Vec<OcrCandidate>,
    /// Number of frames in which any plate-shaped detection occurred.
    pub frames_with_plate: u32,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// One recognition per track lifecycle. Immutable once built.
///
/// Field order is the canonical serialization order used for webhook
/// payloads and signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedEvent {
    pub id: Uuid,
    pub channel_id: String,
    pub track_id: String,
    pub plate: Option<String>,
    pub confidence: f64,
    pub country: Option<String>,
    pub bbox: Option<Vec<f64>>,
    pub direction: Option<Direction>,
    pub image_url: Option<String>,
    pub frames_with_plate: u32,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl ConsolidatedEvent {
    /// Build an event from a finalized track and its consolidation result.
    pub fn from_track(
        track: FinalizedTrack,
        plate: Option<String>,
        confidence: f64,
        country: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id: track.channel_id,
            track_id: track.track_id,
            plate,
            confidence,
            country,
            bbox: track.bbox,
            direction: track.direction,
            image_url: track.image_url,
            frames_with_plate: track.frames_with_plate,
            metadata: track.metadata,
            created_at,
        }
    }

    /// Canonical byte payload: compact JSON in declaration order.
    pub fn canonical_payload(&self) -> Result<Vec<u8>, EngineError> {
        serde_json::to_vec(self).map_err(|e| EngineError::Serialize(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> FinalizedTrack {
        FinalizedTrack {
            track_id: "t-1".to_string(),
            channel_id: "gate-north".to_string(),
            candidates: vec![OcrCandidate::new("AB123", 0.9)],
            frames_with_plate: 4,
            direction: Some(Direction::Up),
            bbox: Some(vec![10.0, 20.0, 110.0, 60.0]),
            image_url: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn relay_mode_parses_case_insensitively() {
        assert_eq!("HOLD_OPEN".parse::<RelayMode>().unwrap(), RelayMode::HoldOpen);
        assert_eq!(" toggle ".parse::<RelayMode>().unwrap(), RelayMode::Toggle);
        assert!(matches!(
            "blink".parse::<RelayMode>(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn event_carries_track_fields() {
        let now = Utc::now();
        let event = ConsolidatedEvent::from_track(
            track(),
            Some("AB123".to_string()),
            0.9,
            None,
            now,
        );
        assert_eq!(event.channel_id, "gate-north");
        assert_eq!(event.frames_with_plate, 4);
        assert_eq!(event.direction, Some(Direction::Up));
        assert_eq!(event.created_at, now);
    }

    #[test]
    fn canonical_payload_is_stable() {
        let event =
            ConsolidatedEvent::from_track(track(), Some("AB123".into()), 0.9, None, Utc::now());
        let a = event.canonical_payload().unwrap();
        let b = event.canonical_payload().unwrap();
        assert_eq!(a, b);
        let text = String::from_utf8(a).unwrap();
        assert!(text.starts_with("{\"id\":"));
        assert!(text.contains("\"plate\":\"AB123\""));
    }

    #[test]
    fn finalized_track_defaults_optional_fields() {
        let track: FinalizedTrack = serde_json::from_str(
            r#"{"track_id":"t","channel_id":"c","frames_with_plate":2}"#,
        )
        .unwrap();
        assert!(track.candidates.is_empty());
        assert!(track.direction.is_none());
        assert!(track.metadata.is_empty());
    }
}
