use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Which kind of countdown is loaded into the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Study,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub fn is_break(self) -> bool {
        !matches!(self, TimerMode::Study)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimerMode::Study => "study",
            TimerMode::ShortBreak => "shortBreak",
            TimerMode::LongBreak => "longBreak",
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "study" => Ok(TimerMode::Study),
            "shortBreak" | "short-break" | "short_break" => Ok(TimerMode::ShortBreak),
            "longBreak" | "long-break" | "long_break" => Ok(TimerMode::LongBreak),
            other => Err(format!("unknown timer mode: {other}")),
        }
    }
}

pub const MIN_DURATION_MIN: u64 = 1;
pub const MAX_DURATION_MIN: u64 = 240;

/// Configured duration per mode, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationConfig {
    #[serde(default = "default_study")]
    pub study_minutes: u64,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u64,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u64,
}

fn default_study() -> u64 {
    25
}
fn default_short_break() -> u64 {
    5
}
fn default_long_break() -> u64 {
    15
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            study_minutes: default_study(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
        }
    }
}

impl DurationConfig {
    /// Build a config, rejecting values outside 1..=240 minutes.
    pub fn new(
        study_minutes: u64,
        short_break_minutes: u64,
        long_break_minutes: u64,
    ) -> Result<Self, ValidationError> {
        let cfg = Self {
            study_minutes,
            short_break_minutes,
            long_break_minutes,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("study_minutes", self.study_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
        ] {
            if !(MIN_DURATION_MIN..=MAX_DURATION_MIN).contains(&value) {
                return Err(ValidationError::DurationOutOfRange {
                    field,
                    value,
                    min: MIN_DURATION_MIN,
                    max: MAX_DURATION_MIN,
                });
            }
        }
        Ok(())
    }

    pub fn minutes_for(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Study => self.study_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    /// Configured duration for `mode` in seconds.
    ///
    /// Uses saturating arithmetic and never returns 0.
    pub fn seconds_for(&self, mode: TimerMode) -> u64 {
        self.minutes_for(mode).saturating_mul(60).max(1)
    }
}

/// How the timer picks the next mode when a countdown completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ModeCycle {
    /// Every N-th completed study session is followed by a long break.
    /// `0` disables long breaks: study and short break simply alternate.
    #[serde(default)]
    pub long_break_every: u32,
}

impl ModeCycle {
    pub fn alternating() -> Self {
        Self { long_break_every: 0 }
    }

    pub fn with_long_break_every(n: u32) -> Self {
        Self { long_break_every: n }
    }

    /// Mode that follows `finished`, given how many study sessions have
    /// completed including the one that just finished.
    pub fn next_mode(&self, finished: TimerMode, completed_studies: u32) -> TimerMode {
        match finished {
            TimerMode::Study => {
                if self.long_break_every > 0
                    && completed_studies > 0
                    && completed_studies % self.long_break_every == 0
                {
                    TimerMode::LongBreak
                } else {
                    TimerMode::ShortBreak
                }
            }
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Study,
        }
    }
}
