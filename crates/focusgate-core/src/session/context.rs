use serde::{Deserialize, Serialize};

use crate::policy::{Decision, PolicyState};

/// Everything a navigation check needs, detached from the coordinator.
///
/// Recomputed after every applied transition, so interceptors running
/// outside the daemon loop can hold a clone and answer `decide` on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecisionContext {
    pub session_active: bool,
    pub is_break_time: bool,
    pub policy: PolicyState,
}

impl DecisionContext {
    pub fn decide(&self, url_or_host: &str) -> Decision {
        self.policy
            .decide(url_or_host, self.session_active, self.is_break_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BlockingMode;

    #[test]
    fn context_decides_with_its_own_flags() {
        let mut policy = PolicyState::default();
        policy.block_list.insert("x.com".into());
        policy.mode = BlockingMode::Blocklist;

        let mut ctx = DecisionContext {
            session_active: true,
            is_break_time: false,
            policy,
        };
        assert_eq!(ctx.decide("https://x.com/home"), Decision::Block);

        ctx.session_active = false;
        assert_eq!(ctx.decide("https://x.com/home"), Decision::Allow);
    }
}
