use serde::{Deserialize, Serialize};

use platewatch_core::{Direction, EngineError, ListType};

use super::{default_true, new_id};
use crate::schedule::ScheduleSpec;

/// Condition → action mapping. Rules are evaluated in registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub conditions: RuleCondition,
    #[serde(default)]
    pub actions: RuleAction,
}

impl Rule {
    pub fn new(name: impl Into<String>, conditions: RuleCondition, actions: RuleAction) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            conditions,
            actions,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Optional filters. An absent field (or empty id list) matches anything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<ListType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    /// Cooldown per (rule, channel) after the rule fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_flood_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_frames: Option<u32>,
}

/// Side effects selected for an event. Flags are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleAction {
    #[serde(default)]
    pub trigger_relay: bool,
    #[serde(default = "default_true")]
    pub send_webhook: bool,
    #[serde(default)]
    pub record_clip: bool,
    #[serde(default = "default_true")]
    pub annotate_ui: bool,
}

impl Default for RuleAction {
    /// Webhook and UI annotation; no relay, no clip.
    fn default() -> Self {
        Self {
            trigger_relay: false,
            send_webhook: true,
            record_clip: false,
            annotate_ui: true,
        }
    }
}

impl RuleAction {
    pub const TRIGGER_RELAY: &'static str = "trigger_relay";
    pub const SEND_WEBHOOK: &'static str = "send_webhook";
    pub const RECORD_CLIP: &'static str = "record_clip";
    pub const ANNOTATE_UI: &'static str = "annotate_ui";

    /// No side effects at all.
    pub const fn none() -> Self {
        Self {
            trigger_relay: false,
            send_webhook: false,
            record_clip: false,
            annotate_ui: false,
        }
    }

    /// Build an action set from flag names, e.g. `["send_webhook", "annotate_ui"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, EngineError> {
        let mut action = Self::none();
        for name in names {
            match name.as_ref().trim() {
                Self::TRIGGER_RELAY => action.trigger_relay = true,
                Self::SEND_WEBHOOK => action.send_webhook = true,
                Self::RECORD_CLIP => action.record_clip = true,
                Self::ANNOTATE_UI => action.annotate_ui = true,
                "" => {}
                other => {
                    return Err(EngineError::Configuration(format!(
                        "unknown rule action: {other}"
                    )))
                }
            }
        }
        Ok(action)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.trigger_relay {
            names.push(Self::TRIGGER_RELAY);
        }
        if self.send_webhook {
            names.push(Self::SEND_WEBHOOK);
        }
        if self.record_clip {
            names.push(Self::RECORD_CLIP);
        }
        if self.annotate_ui {
            names.push(Self::ANNOTATE_UI);
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}
