//! Site-access policy: the block/allow lists and the decision rule.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::normalize::{is_internal_page, normalize};
use super::rules::{compile_rules, RuleSet};

/// How the lists are interpreted during a study session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockingMode {
    /// Block listed sites; the allow list carves out exceptions.
    #[default]
    Blocklist,
    /// Block everything that is not on the allow list.
    Allowlist,
}

impl BlockingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockingMode::Blocklist => "blocklist",
            BlockingMode::Allowlist => "allowlist",
        }
    }
}

impl std::fmt::Display for BlockingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BlockingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "blocklist" | "block" => Ok(BlockingMode::Blocklist),
            "allowlist" | "allow" => Ok(BlockingMode::Allowlist),
            other => Err(format!("unknown blocking mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Block,
}

/// Result of a single-site list edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ListEdit {
    Added { host: String },
    /// `moved` is set when the host was taken off the other list.
    AlreadyPresent { host: String, moved: bool },
    Rejected { reason: String },
}

impl ListEdit {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ListEdit::Rejected { .. })
    }

    /// Whether either list was modified.
    pub fn changed(&self) -> bool {
        match self {
            ListEdit::Added { .. } => true,
            ListEdit::AlreadyPresent { moved, .. } => *moved,
            ListEdit::Rejected { .. } => false,
        }
    }
}

/// Block list, allow list and mode.
///
/// A host may sit on both lists at once; in blocklist mode the allow entry
/// wins. Only the single-site add operations move a host between lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PolicyState {
    pub block_list: IndexSet<String>,
    pub allow_list: IndexSet<String>,
    pub mode: BlockingMode,
}

impl PolicyState {
    /// Decide whether a navigation to `hostname` is intercepted.
    ///
    /// Pure: depends only on the lists, the mode and the arguments.
    pub fn decide(&self, hostname: &str, session_active: bool, is_break_time: bool) -> Decision {
        if !session_active || is_break_time {
            return Decision::Allow;
        }
        let host = normalize(hostname);
        let blocked = match self.mode {
            BlockingMode::Blocklist => {
                self.block_list.contains(&host) && !self.allow_list.contains(&host)
            }
            BlockingMode::Allowlist => !self.allow_list.contains(&host),
        };
        if blocked {
            Decision::Block
        } else {
            Decision::Allow
        }
    }

    /// Blocked hosts that are not excepted by the allow list, in list order.
    pub fn sites_to_block(&self) -> impl Iterator<Item = &str> {
        self.block_list
            .iter()
            .filter(|host| !self.allow_list.contains(*host))
            .map(String::as_str)
    }
}

/// Owns the policy state and every mutation of it.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    state: PolicyState,
}

impl PolicyEngine {
    pub fn new(state: PolicyState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &PolicyState {
        &self.state
    }

    pub fn mode(&self) -> BlockingMode {
        self.state.mode
    }

    pub fn block_list(&self) -> &IndexSet<String> {
        &self.state.block_list
    }

    pub fn allow_list(&self) -> &IndexSet<String> {
        &self.state.allow_list
    }

    // ── Bulk replacement ─────────────────────────────────────────────

    pub fn set_block_list<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.state.block_list = normalize_all(hosts);
        info!(count = self.state.block_list.len(), "Block list replaced");
    }

    pub fn set_allow_list<I, S>(&mut self, hosts: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.state.allow_list = normalize_all(hosts);
        info!(count = self.state.allow_list.len(), "Allow list replaced");
    }

    pub fn set_mode(&mut self, mode: BlockingMode) {
        self.state.mode = mode;
        info!(%mode, "Blocking mode set");
    }

    // ── Single-site edits ────────────────────────────────────────────

    /// Add a site to the block list, taking it off the allow list.
    pub fn add_to_block_list(&mut self, raw: &str) -> ListEdit {
        let PolicyState {
            block_list,
            allow_list,
            ..
        } = &mut self.state;
        add_exclusive(raw, block_list, allow_list)
    }

    /// Add a site to the allow list, taking it off the block list.
    pub fn add_to_allow_list(&mut self, raw: &str) -> ListEdit {
        let PolicyState {
            block_list,
            allow_list,
            ..
        } = &mut self.state;
        add_exclusive(raw, allow_list, block_list)
    }

    pub fn remove_from_block_list(&mut self, raw: &str) -> bool {
        self.state.block_list.shift_remove(&normalize(raw))
    }

    pub fn remove_from_allow_list(&mut self, raw: &str) -> bool {
        self.state.allow_list.shift_remove(&normalize(raw))
    }

    // ── Evaluation ───────────────────────────────────────────────────

    pub fn decide(&self, hostname: &str, session_active: bool, is_break_time: bool) -> Decision {
        self.state.decide(hostname, session_active, is_break_time)
    }

    pub fn compile_interception_rules(
        &self,
        session_active: bool,
        is_break_time: bool,
        block_page_url: &str,
    ) -> RuleSet {
        compile_rules(&self.state, session_active, is_break_time, block_page_url)
    }
}

fn normalize_all<I, S>(hosts: I) -> IndexSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hosts
        .into_iter()
        .map(|raw| normalize(raw.as_ref()))
        .filter(|host| !host.is_empty())
        .collect()
}

fn add_exclusive(raw: &str, target: &mut IndexSet<String>, other: &mut IndexSet<String>) -> ListEdit {
    if is_internal_page(raw) {
        debug!(raw, "Refusing to list a browser-internal page");
        return ListEdit::Rejected {
            reason: "browser pages cannot be added to site lists".to_string(),
        };
    }
    let host = normalize(raw);
    if host.is_empty() {
        return ListEdit::Rejected {
            reason: "no hostname in input".to_string(),
        };
    }
    let moved = other.shift_remove(&host);
    if target.insert(host.clone()) {
        ListEdit::Added { host }
    } else {
        ListEdit::AlreadyPresent { host, moved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(block: &[&str], allow: &[&str], mode: BlockingMode) -> PolicyEngine {
        let mut engine = PolicyEngine::default();
        engine.set_block_list(block);
        engine.set_allow_list(allow);
        engine.set_mode(mode);
        engine
    }

    #[test]
    fn blocklist_blocks_listed_host_during_session() {
        let mut engine = engine_with(&["x.com"], &[], BlockingMode::Blocklist);
        assert_eq!(engine.decide("x.com", true, false), Decision::Block);
        assert_eq!(engine.decide("y.com", true, false), Decision::Allow);

        engine.set_allow_list(["x.com"]);
        assert_eq!(engine.decide("x.com", true, false), Decision::Allow);
    }

    #[test]
    fn allowlist_blocks_everything_else() {
        let engine = engine_with(&["y.com"], &["y.com"], BlockingMode::Allowlist);
        assert_eq!(engine.decide("y.com", true, false), Decision::Allow);
        assert_eq!(engine.decide("z.com", true, false), Decision::Block);
        assert_eq!(engine.decide("mail.y.com", true, false), Decision::Block);
    }

    #[test]
    fn no_blocking_outside_active_study_session() {
        let engine = engine_with(&["x.com"], &[], BlockingMode::Allowlist);
        for host in ["x.com", "y.com", "anything"] {
            assert_eq!(engine.decide(host, false, false), Decision::Allow);
            assert_eq!(engine.decide(host, true, true), Decision::Allow);
        }
    }

    #[test]
    fn decide_normalizes_the_queried_host() {
        let engine = engine_with(&["x.com"], &[], BlockingMode::Blocklist);
        assert_eq!(engine.decide("https://www.X.com/feed", true, false), Decision::Block);
    }

    #[test]
    fn decide_is_repeatable() {
        let engine = engine_with(&["a.com", "b.com"], &["b.com"], BlockingMode::Blocklist);
        for host in ["a.com", "b.com", "c.com"] {
            assert_eq!(
                engine.decide(host, true, false),
                engine.decide(host, true, false)
            );
        }
    }

    #[test]
    fn single_site_adds_are_mutually_exclusive() {
        let mut engine = engine_with(&[], &["x.com"], BlockingMode::Blocklist);
        assert_eq!(
            engine.add_to_block_list("https://www.x.com/"),
            ListEdit::Added { host: "x.com".into() }
        );
        assert!(engine.block_list().contains("x.com"));
        assert!(!engine.allow_list().contains("x.com"));

        assert_eq!(
            engine.add_to_allow_list("x.com"),
            ListEdit::Added { host: "x.com".into() }
        );
        assert!(!engine.block_list().contains("x.com"));
        assert!(engine.allow_list().contains("x.com"));
    }

    #[test]
    fn bulk_replace_does_not_enforce_exclusion() {
        let engine = engine_with(&["x.com"], &["x.com"], BlockingMode::Blocklist);
        assert!(engine.block_list().contains("x.com"));
        assert!(engine.allow_list().contains("x.com"));
    }

    #[test]
    fn bulk_replace_normalizes_and_dedupes() {
        let engine = engine_with(
            &["https://www.x.com/a", "X.com", "", "y.com"],
            &[],
            BlockingMode::Blocklist,
        );
        let hosts: Vec<&str> = engine.block_list().iter().map(String::as_str).collect();
        assert_eq!(hosts, vec!["x.com", "y.com"]);
    }

    #[test]
    fn duplicate_add_reports_already_present() {
        let mut engine = PolicyEngine::default();
        engine.add_to_block_list("x.com");
        assert_eq!(
            engine.add_to_block_list("www.x.com"),
            ListEdit::AlreadyPresent {
                host: "x.com".into(),
                moved: false
            }
        );
        assert_eq!(engine.block_list().len(), 1);
    }

    #[test]
    fn duplicate_add_still_moves_host_off_other_list() {
        let mut engine = engine_with(&["x.com"], &["x.com"], BlockingMode::Blocklist);
        let edit = engine.add_to_block_list("x.com");
        assert_eq!(
            edit,
            ListEdit::AlreadyPresent {
                host: "x.com".into(),
                moved: true
            }
        );
        assert!(edit.changed());
        assert!(engine.allow_list().is_empty());
    }

    #[test]
    fn browser_pages_are_rejected() {
        let mut engine = PolicyEngine::default();
        assert!(engine.add_to_block_list("chrome://settings").is_rejected());
        assert!(engine.add_to_allow_list("   ").is_rejected());
        assert!(engine.block_list().is_empty());
    }

    #[test]
    fn removal_has_no_side_effect_on_other_list() {
        let mut engine = engine_with(&["x.com"], &["x.com"], BlockingMode::Blocklist);
        assert!(engine.remove_from_block_list("www.x.com"));
        assert!(engine.allow_list().contains("x.com"));
        assert!(!engine.remove_from_block_list("x.com"));
    }

    #[test]
    fn mode_parses() {
        assert_eq!("Allowlist".parse::<BlockingMode>().unwrap(), BlockingMode::Allowlist);
        assert!("denylist".parse::<BlockingMode>().is_err());
    }
}
