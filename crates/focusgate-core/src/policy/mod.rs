//! Site-access policy.
//!
//! - Hostname normalization for list entries and navigation checks
//! - Block/allow list editing and the allow/block decision
//! - Compilation of the lists into declarative redirect rules

mod engine;
mod normalize;
mod rules;

pub use engine::{BlockingMode, Decision, ListEdit, PolicyEngine, PolicyState};
pub use normalize::{is_internal_page, normalize};
pub use rules::{
    compile_rules, InterceptionRule, Redirect, ResourceType, RuleAction, RuleCondition, RuleSet,
    CATCH_ALL_FILTER,
};
