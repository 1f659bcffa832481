//! Typed client contract: one `Command` in, one `Response` out.

use serde::{Deserialize, Serialize};

use crate::policy::{BlockingMode, Decision, ListEdit, PolicyState};
use crate::timer::{DurationConfig, TimerMode};

/// A client request. On the wire the variant name is the `action` field.
///
/// ```json
/// {"action": "setMode", "mode": "shortBreak", "timeLeft": 300}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    GetTimerState,
    StartTimer,
    PauseTimer,
    ResumeTimer,
    ResetTimer {
        #[serde(default)]
        new_time_left: Option<u64>,
    },
    SetMode {
        mode: TimerMode,
        #[serde(default)]
        time_left: Option<u64>,
    },
    /// Replace both lists wholesale; a missing list is replaced by an empty one.
    UpdateWebsiteRules {
        #[serde(default)]
        blocked_sites: Vec<String>,
        #[serde(default)]
        allowed_sites: Vec<String>,
        #[serde(default)]
        blocking_mode: Option<BlockingMode>,
    },
    /// List update only. Whether a session is active is derived from the timer.
    StartStudySession {
        #[serde(default)]
        blocked_sites: Vec<String>,
        #[serde(default)]
        allowed_sites: Vec<String>,
    },
    /// Lists are replaced only when present.
    StopStudySession {
        #[serde(default)]
        blocked_sites: Option<Vec<String>>,
        #[serde(default)]
        allowed_sites: Option<Vec<String>>,
    },
    AddToBlockList {
        site: String,
    },
    AddToAllowList {
        site: String,
    },
    RemoveFromBlockList {
        site: String,
    },
    RemoveFromAllowList {
        site: String,
    },
    SetBlockingMode {
        mode: BlockingMode,
    },
    SetDurations {
        study_minutes: u64,
        short_break_minutes: u64,
        long_break_minutes: u64,
    },
    GetPolicyState,
    CheckNavigation {
        url: String,
    },
}

impl Command {
    /// Read-only commands, answerable before the persisted state is loaded.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::GetTimerState | Command::GetPolicyState | Command::CheckNavigation { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::GetTimerState => "getTimerState",
            Command::StartTimer => "startTimer",
            Command::PauseTimer => "pauseTimer",
            Command::ResumeTimer => "resumeTimer",
            Command::ResetTimer { .. } => "resetTimer",
            Command::SetMode { .. } => "setMode",
            Command::UpdateWebsiteRules { .. } => "updateWebsiteRules",
            Command::StartStudySession { .. } => "startStudySession",
            Command::StopStudySession { .. } => "stopStudySession",
            Command::AddToBlockList { .. } => "addToBlockList",
            Command::AddToAllowList { .. } => "addToAllowList",
            Command::RemoveFromBlockList { .. } => "removeFromBlockList",
            Command::RemoveFromAllowList { .. } => "removeFromAllowList",
            Command::SetBlockingMode { .. } => "setBlockingMode",
            Command::SetDurations { .. } => "setDurations",
            Command::GetPolicyState => "getPolicyState",
            Command::CheckNavigation { .. } => "checkNavigation",
        }
    }
}

/// Timer state as reported to clients. `remaining_seconds` is reconciled
/// against the clock at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub mode: TimerMode,
    pub running: bool,
    pub paused: bool,
    pub remaining_seconds: u64,
    pub original_duration_seconds: u64,
    pub start_epoch_millis: Option<u64>,
    pub is_break_time: bool,
    pub session_active: bool,
    pub completed_study_sessions: u32,
    pub durations: DurationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_state: Option<TimerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit: Option<ListEdit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_timer(view: TimerView) -> Self {
        Self {
            timer_state: Some(view),
            ..Self::ok()
        }
    }

    pub fn with_policy(policy: PolicyState) -> Self {
        Self {
            policy: Some(policy),
            ..Self::ok()
        }
    }

    pub fn with_decision(decision: Decision) -> Self {
        Self {
            decision: Some(decision),
            ..Self::ok()
        }
    }

    pub fn with_edit(edit: ListEdit) -> Self {
        let success = !edit.is_rejected();
        Self {
            success,
            edit: Some(edit),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn commands_parse_from_action_tag() {
        let cmd: Command = serde_json::from_value(json!({"action": "getTimerState"})).unwrap();
        assert_eq!(cmd, Command::GetTimerState);

        let cmd: Command =
            serde_json::from_value(json!({"action": "resetTimer", "newTimeLeft": 90})).unwrap();
        assert_eq!(cmd, Command::ResetTimer { new_time_left: Some(90) });

        let cmd: Command = serde_json::from_value(json!({"action": "resetTimer"})).unwrap();
        assert_eq!(cmd, Command::ResetTimer { new_time_left: None });

        let cmd: Command =
            serde_json::from_value(json!({"action": "setMode", "mode": "longBreak"})).unwrap();
        assert_eq!(
            cmd,
            Command::SetMode {
                mode: TimerMode::LongBreak,
                time_left: None
            }
        );
    }

    #[test]
    fn website_rules_accept_extra_fields_and_missing_lists() {
        let cmd: Command = serde_json::from_value(json!({
            "action": "updateWebsiteRules",
            "blockedSites": ["x.com"],
            "isStudyActive": true
        }))
        .unwrap();
        assert_eq!(
            cmd,
            Command::UpdateWebsiteRules {
                blocked_sites: vec!["x.com".into()],
                allowed_sites: vec![],
                blocking_mode: None,
            }
        );
    }

    #[test]
    fn unknown_action_is_an_error() {
        assert!(serde_json::from_value::<Command>(json!({"action": "selfDestruct"})).is_err());
    }

    #[test]
    fn name_matches_wire_tag() {
        let cmd = Command::AddToBlockList { site: "x.com".into() };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["action"], cmd.name());
    }

    #[test]
    fn response_omits_empty_fields() {
        let json = serde_json::to_value(Response::ok()).unwrap();
        assert_eq!(json, json!({"success": true}));

        let json = serde_json::to_value(Response::with_decision(Decision::Block)).unwrap();
        assert_eq!(json, json!({"success": true, "decision": "block"}));
    }

    #[test]
    fn rejected_edit_is_not_a_success() {
        let response = Response::with_edit(ListEdit::Rejected {
            reason: "nope".into(),
        });
        assert!(!response.success);
    }
}
