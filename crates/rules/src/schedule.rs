//! Activity windows.
//!
//! The decision engine only ever asks "is this active at `t`?" through
//! [`ActivityWindow`]. [`ScheduleSpec`] is the configuration form; it
//! compiles into a [`TimeWindow`] once, at registration.

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use platewatch_core::EngineError;

/// Predicate deciding whether a list or rule is active at an instant.
pub trait ActivityWindow: Send + Sync + Debug {
    fn is_active_at(&self, at: DateTime<Utc>) -> bool;
}

/// Configured weekly time window.
///
/// ```yaml
/// schedule:
///   days: [mon, tue, wed, thu, fri]
///   from: "22:00"
///   to: "06:00"        # overnight windows wrap past midnight
///   utc_offset_minutes: 180
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    /// Days the window opens on. Empty means every day.
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl ScheduleSpec {
    pub fn compile(&self) -> Result<Arc<dyn ActivityWindow>, EngineError> {
        Ok(Arc::new(TimeWindow::try_from(self)?))
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| EngineError::Configuration(format!("invalid schedule time '{value}': {e}")))
}

/// Compiled [`ScheduleSpec`].
#[derive(Debug, Clone)]
pub struct TimeWindow {
    days: Vec<Weekday>,
    from: NaiveTime,
    to: NaiveTime,
    offset: FixedOffset,
}

impl TryFrom<&ScheduleSpec> for TimeWindow {
    type Error = EngineError;

    fn try_from(spec: &ScheduleSpec) -> Result<Self, Self::Error> {
        let midnight = NaiveTime::MIN;
        let from = spec.from.as_deref().map(parse_time).transpose()?.unwrap_or(midnight);
        let to = spec.to.as_deref().map(parse_time).transpose()?.unwrap_or(midnight);
        let offset = FixedOffset::east_opt(spec.utc_offset_minutes * 60).ok_or_else(|| {
            EngineError::Configuration(format!(
                "invalid schedule utc_offset_minutes: {}",
                spec.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            days: spec.days.clone(),
            from,
            to,
            offset,
        })
    }
}

impl TimeWindow {
    fn opens_on(&self, day: Weekday) -> bool {
        self.days.is_empty() || self.days.contains(&day)
    }
}

impl ActivityWindow for TimeWindow {
    fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.offset);
        let time = local.time();
        let today = local.weekday();

        if self.from == self.to {
            // Whole day.
            return self.opens_on(today);
        }
        if self.from < self.to {
            return self.opens_on(today) && time >= self.from && time < self.to;
        }
        // Overnight: the part after midnight belongs to the previous day's window.
        let yesterday = (local - Duration::days(1)).weekday();
        (time >= self.from && self.opens_on(today)) || (time < self.to && self.opens_on(yesterday))
    }
}
