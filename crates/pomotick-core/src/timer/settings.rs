use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Fixed minutes -> milliseconds factor.
pub const MS_PER_MINUTE: f64 = 60_000.0;

/// Which segment type is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub const ALL: [TimerMode; 3] = [TimerMode::Focus, TimerMode::ShortBreak, TimerMode::LongBreak];

    /// Wire name, as used by the bridge and the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "shortBreak",
            TimerMode::LongBreak => "longBreak",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimerMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidMode(s.to_string()))
    }
}

/// Lifecycle stage of the current segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

/// Process-wide timer configuration.
///
/// Durations are real minutes so that short test segments (`0.01`) work the
/// same way as regular ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: f64,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: f64,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: f64,
    #[serde(default = "default_long_break_every")]
    pub long_break_every: u32,
    #[serde(default)]
    pub auto_start_next: bool,
}

fn default_focus_minutes() -> f64 {
    25.0
}
fn default_short_break_minutes() -> f64 {
    5.0
}
fn default_long_break_minutes() -> f64 {
    15.0
}
fn default_long_break_every() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            long_break_every: default_long_break_every(),
            auto_start_next: false,
        }
    }
}

impl TimerSettings {
    pub fn minutes_for(&self, mode: TimerMode) -> f64 {
        match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    /// Nominal segment length in whole milliseconds.
    pub fn duration_ms(&self, mode: TimerMode) -> u64 {
        let ms = (self.minutes_for(mode) * MS_PER_MINUTE).round();
        if ms.is_finite() && ms > 0.0 {
            ms as u64
        } else {
            0
        }
    }

    /// Break that follows a focus segment, given the focus count at that point.
    ///
    /// A count of zero (nothing finished yet, e.g. skipping the very first
    /// focus) always selects the short break.
    pub fn break_after(&self, completed_focus: u64) -> TimerMode {
        let every = u64::from(self.long_break_every.max(1));
        if completed_focus > 0 && completed_focus % every == 0 {
            TimerMode::LongBreak
        } else {
            TimerMode::ShortBreak
        }
    }

    /// Apply `patch` field by field.
    ///
    /// Non-finite or non-positive numbers leave the previous value in place;
    /// `longBreakEvery` is floored to an integer no smaller than 1.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            focus_minutes: normalize_minutes(patch.focus_minutes, self.focus_minutes),
            short_break_minutes: normalize_minutes(patch.short_break_minutes, self.short_break_minutes),
            long_break_minutes: normalize_minutes(patch.long_break_minutes, self.long_break_minutes),
            long_break_every: normalize_cycle(patch.long_break_every, self.long_break_every),
            auto_start_next: patch.auto_start_next.unwrap_or(self.auto_start_next),
        }
    }
}

/// Partial settings record. Absent fields mean "no change".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_break_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_every: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start_next: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

impl From<&TimerSettings> for SettingsPatch {
    fn from(settings: &TimerSettings) -> Self {
        Self {
            focus_minutes: Some(settings.focus_minutes),
            short_break_minutes: Some(settings.short_break_minutes),
            long_break_minutes: Some(settings.long_break_minutes),
            long_break_every: Some(f64::from(settings.long_break_every)),
            auto_start_next: Some(settings.auto_start_next),
        }
    }
}

fn normalize_minutes(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => fallback,
    }
}

fn normalize_cycle(value: Option<f64>, fallback: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.floor().clamp(1.0, f64::from(u32::MAX)) as u32,
        _ => fallback,
    }
}
