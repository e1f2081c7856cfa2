use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use platewatch_core::ListType;

use super::{default_true, new_id};
use crate::schedule::ScheduleSpec;

/// How a list's item patterns are compared with a plate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Pattern is normalized like a plate and compared for equality.
    #[default]
    Exact,
    /// Pattern is a case-insensitive regex that must match the whole plate.
    Regex,
}

/// A named, prioritized plate collection.
///
/// Lower `priority` is evaluated first; ties fall back to registration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchList {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub list_type: ListType,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Default TTL for items that set neither `ttl_seconds` nor `expires_at`.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    /// Channels the list applies to. Empty means all channels.
    #[serde(default)]
    pub channel_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<WatchListItem>,
}

fn default_priority() -> i32 {
    100
}

impl WatchList {
    pub fn new(name: impl Into<String>, list_type: ListType, priority: i32) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            list_type,
            priority,
            match_mode: MatchMode::Exact,
            ttl_seconds: None,
            schedule: None,
            channel_ids: Vec::new(),
            is_active: true,
            description: None,
            items: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_item(mut self, item: WatchListItem) -> Self {
        self.items.push(item);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchListItem {
    #[serde(default = "new_id")]
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl WatchListItem {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            pattern: pattern.into(),
            comment: None,
            ttl_seconds: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Absolute `expires_at` wins; otherwise the item TTL, then the list TTL,
    /// measured from `created_at`. `None` means the item never expires.
    pub fn effective_expiry(&self, list_ttl: Option<u64>) -> Option<DateTime<Utc>> {
        if let Some(at) = self.expires_at {
            return Some(at);
        }
        let ttl = self.ttl_seconds.or(list_ttl)?;
        let ttl = Duration::try_seconds(i64::try_from(ttl).ok()?)?;
        self.created_at.checked_add_signed(ttl)
    }

    pub fn is_expired_at(&self, list_ttl: Option<u64>, at: DateTime<Utc>) -> bool {
        self.effective_expiry(list_ttl).is_some_and(|expiry| at >= expiry)
    }
}
