use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::BlockingMode;
use crate::timer::{DurationConfig, TimerMode};

/// Every state change in the system produces an Event.
/// The daemon broadcasts them to listening clients; a client that sees
/// `timerComplete` is expected to re-query the timer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    TimerStarted {
        mode: TimerMode,
        duration_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: TimerMode,
        to: TimerMode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero and the timer moved on to the next mode.
    #[serde(rename = "timerComplete")]
    TimerCompleted {
        finished: TimerMode,
        next: TimerMode,
        at: DateTime<Utc>,
    },
    DurationsChanged {
        durations: DurationConfig,
        at: DateTime<Utc>,
    },
    PolicyChanged {
        blocking_mode: BlockingMode,
        blocked: usize,
        allowed: usize,
        at: DateTime<Utc>,
    },
    RulesUpdated {
        session_active: bool,
        rule_count: usize,
        needs_navigation_hook: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Wire name of the event, as found in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timerStarted",
            Event::TimerPaused { .. } => "timerPaused",
            Event::TimerResumed { .. } => "timerResumed",
            Event::TimerReset { .. } => "timerReset",
            Event::ModeChanged { .. } => "modeChanged",
            Event::TimerCompleted { .. } => "timerComplete",
            Event::DurationsChanged { .. } => "durationsChanged",
            Event::PolicyChanged { .. } => "policyChanged",
            Event::RulesUpdated { .. } => "rulesUpdated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_uses_timer_complete_tag() {
        let event = Event::TimerCompleted {
            finished: TimerMode::Study,
            next: TimerMode::ShortBreak,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "timerComplete");
        assert_eq!(json["next"], "shortBreak");
        assert_eq!(event.kind(), "timerComplete");
    }

    #[test]
    fn fields_are_camel_case() {
        let event = Event::TimerPaused {
            mode: TimerMode::Study,
            remaining_secs: 42,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "timerPaused");
        assert_eq!(json["remainingSecs"], 42);
    }
}
