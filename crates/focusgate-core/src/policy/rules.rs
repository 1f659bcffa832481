//! Declarative interception rules in the browser's redirect-rule shape.

use serde::{Deserialize, Serialize};

use super::engine::{BlockingMode, PolicyState};

/// Pattern that matches every URL; used when the allow list is empty.
pub const CATCH_ALL_FILTER: &str = "*://*/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleAction {
    Redirect { redirect: Redirect },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptionRule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl InterceptionRule {
    fn redirect(id: u32, url_filter: String, block_page_url: &str) -> Self {
        Self {
            id,
            priority: 1,
            action: RuleAction::Redirect {
                redirect: Redirect {
                    url: block_page_url.to_string(),
                },
            },
            condition: RuleCondition {
                url_filter,
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }

    pub fn url_filter(&self) -> &str {
        &self.condition.url_filter
    }
}

/// The full rule set to install.
///
/// When `needs_navigation_hook` is set the declarative rules are not enough
/// and every top-level navigation must be checked against
/// [`PolicyState::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub rules: Vec<InterceptionRule>,
    pub needs_navigation_hook: bool,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && !self.needs_navigation_hook
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Compile the policy into redirect rules.
///
/// Nothing is intercepted outside an active study session. In blocklist
/// mode each blocked host that is not excepted gets two rules, one for the
/// bare host and one for its subdomains, with ids `2i+1` and `2i+2`.
pub fn compile_rules(
    state: &PolicyState,
    session_active: bool,
    is_break_time: bool,
    block_page_url: &str,
) -> RuleSet {
    if !session_active || is_break_time {
        return RuleSet::default();
    }

    match state.mode {
        BlockingMode::Blocklist => {
            let rules = state
                .sites_to_block()
                .zip(0u32..)
                .flat_map(|(host, i)| {
                    [
                        InterceptionRule::redirect(2 * i + 1, format!("*://{host}/*"), block_page_url),
                        InterceptionRule::redirect(
                            2 * i + 2,
                            format!("*://*.{host}/*"),
                            block_page_url,
                        ),
                    ]
                })
                .collect();
            RuleSet {
                rules,
                needs_navigation_hook: false,
            }
        }
        BlockingMode::Allowlist if state.allow_list.is_empty() => RuleSet {
            rules: vec![InterceptionRule::redirect(
                1,
                CATCH_ALL_FILTER.to_string(),
                block_page_url,
            )],
            needs_navigation_hook: false,
        },
        BlockingMode::Allowlist => RuleSet {
            rules: Vec::new(),
            needs_navigation_hook: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyEngine;

    const BLOCK_PAGE: &str = "blocked.html";

    fn state(block: &[&str], allow: &[&str], mode: BlockingMode) -> PolicyState {
        let mut engine = PolicyEngine::default();
        engine.set_block_list(block);
        engine.set_allow_list(allow);
        engine.set_mode(mode);
        engine.state().clone()
    }

    #[test]
    fn blocklist_emits_two_rules_per_host() {
        let s = state(&["a.com", "b.com"], &[], BlockingMode::Blocklist);
        let set = compile_rules(&s, true, false, BLOCK_PAGE);

        let ids: Vec<u32> = set.rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let filters: Vec<&str> = set.rules.iter().map(|r| r.url_filter()).collect();
        assert_eq!(
            filters,
            vec!["*://a.com/*", "*://*.a.com/*", "*://b.com/*", "*://*.b.com/*"]
        );
        assert!(!set.needs_navigation_hook);
    }

    #[test]
    fn excepted_hosts_are_skipped_and_ids_stay_dense() {
        let s = state(&["a.com", "b.com", "c.com"], &["b.com"], BlockingMode::Blocklist);
        let set = compile_rules(&s, true, false, BLOCK_PAGE);

        assert_eq!(set.len(), 4);
        assert_eq!(set.rules[2].id, 3);
        assert_eq!(set.rules[2].url_filter(), "*://c.com/*");
    }

    #[test]
    fn empty_allowlist_blocks_everything() {
        let s = state(&["a.com"], &[], BlockingMode::Allowlist);
        let set = compile_rules(&s, true, false, BLOCK_PAGE);

        assert_eq!(set.len(), 1);
        assert_eq!(set.rules[0].url_filter(), CATCH_ALL_FILTER);
        assert!(!set.needs_navigation_hook);
    }

    #[test]
    fn non_empty_allowlist_needs_navigation_hook() {
        let s = state(&[], &["docs.rs"], BlockingMode::Allowlist);
        let set = compile_rules(&s, true, false, BLOCK_PAGE);

        assert!(set.rules.is_empty());
        assert!(set.needs_navigation_hook);
    }

    #[test]
    fn inactive_session_or_break_clears_rules() {
        let s = state(&["a.com"], &[], BlockingMode::Blocklist);
        assert!(compile_rules(&s, false, false, BLOCK_PAGE).is_empty());
        assert!(compile_rules(&s, true, true, BLOCK_PAGE).is_empty());

        let s = state(&[], &["docs.rs"], BlockingMode::Allowlist);
        assert!(compile_rules(&s, true, true, BLOCK_PAGE).is_empty());
    }

    #[test]
    fn rules_serialize_in_redirect_rule_shape() {
        let s = state(&["a.com"], &[], BlockingMode::Blocklist);
        let set = compile_rules(&s, true, false, BLOCK_PAGE);
        let json = serde_json::to_value(&set.rules[0]).unwrap();

        assert_eq!(json["id"], 1);
        assert_eq!(json["action"]["type"], "redirect");
        assert_eq!(json["action"]["redirect"]["url"], BLOCK_PAGE);
        assert_eq!(json["condition"]["urlFilter"], "*://a.com/*");
        assert_eq!(json["condition"]["resourceTypes"][0], "main_frame");
    }
}
