//! Glue between the timer, the policy and the outside world.
//!
//! The coordinator applies commands synchronously and never performs I/O.
//! Side effects are collected in an [`Outbox`] that the daemon drains after
//! each handling pass: persist the snapshot, push the rules, broadcast the
//! events. The decision context and rule set are recomputed before a
//! response is built, so every reply reflects the new state.

use tracing::{debug, info, warn};

use super::command::{Command, Response, TimerView};
use super::context::DecisionContext;
use crate::events::Event;
use crate::policy::{Decision, ListEdit, PolicyEngine, RuleSet};
use crate::storage::{Config, Snapshot};
use crate::timer::{Clock, DurationConfig, ModeCycle, TickOutcome, TimerEngine};
use crate::error::InvalidTransition;

/// Settings the coordinator takes from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub block_page_url: String,
    pub checkpoint_interval_secs: u64,
    pub cycle: ModeCycle,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            block_page_url: config.interceptor.block_page_url.clone(),
            checkpoint_interval_secs: config.timer.checkpoint_interval_secs.max(1),
            cycle: config.mode_cycle(),
        }
    }
}

/// Side effects owed to the outside world.
#[derive(Debug, Default, PartialEq)]
pub struct Outbox {
    /// The full snapshot must be written.
    pub persist: bool,
    /// Rules to install, if they changed.
    pub rules: Option<RuleSet>,
    pub events: Vec<Event>,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        !self.persist && self.rules.is_none() && self.events.is_empty()
    }
}

pub struct SessionCoordinator {
    timer: TimerEngine,
    policy: PolicyEngine,
    clock: Box<dyn Clock>,
    settings: CoordinatorSettings,
    context: DecisionContext,
    rules: RuleSet,
    /// False until a rule set has been handed to the interceptor.
    rules_installed: bool,
    outbox: Outbox,
    last_checkpoint_ms: Option<u64>,
}

impl SessionCoordinator {
    /// A coordinator holding default state. Nothing is queued until the
    /// first mutation or [`restore`](Self::restore).
    pub fn new(clock: impl Clock + 'static, settings: CoordinatorSettings) -> Self {
        let timer = TimerEngine::new(DurationConfig::default(), settings.cycle);
        let policy = PolicyEngine::default();
        let mut coordinator = Self {
            timer,
            policy,
            clock: Box::new(clock),
            settings,
            context: DecisionContext::default(),
            rules: RuleSet::default(),
            rules_installed: false,
            outbox: Outbox::default(),
            last_checkpoint_ms: None,
        };
        coordinator.recompute();
        coordinator.outbox = Outbox::default();
        coordinator
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn decision_context(&self) -> &DecisionContext {
        &self.context
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn checkpoint_due(&self, now_ms: u64) -> bool {
        match self.last_checkpoint_ms {
            None => true,
            Some(last) => {
                now_ms.saturating_sub(last) >= self.settings.checkpoint_interval_secs * 1000
            }
        }
    }

    pub fn timer_view(&self) -> TimerView {
        let now = self.clock.now_ms();
        let run_state = self.timer.run_state();
        TimerView {
            mode: self.timer.mode(),
            running: run_state.running(),
            paused: run_state.paused(),
            remaining_seconds: self.timer.remaining_at(now),
            original_duration_seconds: self.timer.original_duration_seconds(),
            start_epoch_millis: self.timer.start_epoch_ms(),
            is_break_time: self.timer.is_break_time(),
            session_active: self.timer.session_active(),
            completed_study_sessions: self.timer.completed_study_sessions(),
            durations: self.timer.durations(),
        }
    }

    /// Navigation decision against the last recorded context.
    pub fn decide_navigation(&self, url: &str) -> Decision {
        self.context.decide(url)
    }

    /// The full persisted surface, with a running countdown reconciled.
    pub fn snapshot(&self) -> Snapshot {
        let mut timer = self.timer.record();
        timer.remaining_seconds = self.timer.remaining_at(self.clock.now_ms());
        Snapshot {
            timer,
            policy: self.policy.state().clone(),
            durations: self.timer.durations(),
            last_save_time: self.last_checkpoint_ms,
        }
    }

    // ── Driving ──────────────────────────────────────────────────────

    /// Replace the in-memory state with a loaded snapshot.
    ///
    /// A countdown that expired while nothing was running completes here.
    /// Rules are always queued afterwards so the interceptor starts in sync.
    pub fn restore(&mut self, snapshot: Snapshot) {
        let now = self.clock.now_ms();
        let (timer, completed) =
            TimerEngine::restore(snapshot.timer, snapshot.durations, self.settings.cycle, now);
        self.timer = timer;
        self.policy = PolicyEngine::new(snapshot.policy);
        self.last_checkpoint_ms = snapshot.last_save_time;
        self.rules_installed = false;

        info!(
            mode = %self.timer.mode(),
            state = %self.timer.run_state(),
            remaining = self.timer.remaining_seconds(),
            blocked = self.policy.block_list().len(),
            allowed = self.policy.allow_list().len(),
            "State restored"
        );

        if let Some(event) = completed {
            self.outbox.events.push(event);
            self.outbox.persist = true;
        }
        self.recompute();
    }

    /// Periodic driver callback.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now_ms();
        let outcome = self.timer.tick(now);
        match &outcome {
            TickOutcome::Idle => {}
            TickOutcome::Counting { .. } => {
                if self.checkpoint_due(now) {
                    self.outbox.persist = true;
                }
            }
            TickOutcome::Completed(event) => {
                self.outbox.events.push(event.clone());
                self.changed();
            }
        }
        outcome
    }

    /// Apply one client command.
    pub fn handle(&mut self, command: Command) -> Response {
        let now = self.clock.now_ms();
        debug!(action = command.name(), "Handling command");

        match command {
            Command::GetTimerState => Response::with_timer(self.timer_view()),
            Command::StartTimer => {
                let result = self.timer.start(now);
                self.apply_transition(result)
            }
            Command::PauseTimer => {
                let result = self.timer.pause(now);
                self.apply_transition(result)
            }
            Command::ResumeTimer => {
                let result = self.timer.resume(now);
                self.apply_transition(result)
            }
            Command::ResetTimer { new_time_left } => {
                let event = self.timer.reset(new_time_left);
                self.apply_transition(Ok(Some(event)))
            }
            Command::SetMode { mode, time_left } => {
                let event = self.timer.set_mode(mode, time_left);
                self.apply_transition(Ok(Some(event)))
            }
            Command::UpdateWebsiteRules {
                blocked_sites,
                allowed_sites,
                blocking_mode,
            } => {
                self.policy.set_block_list(blocked_sites);
                self.policy.set_allow_list(allowed_sites);
                if let Some(mode) = blocking_mode {
                    self.policy.set_mode(mode);
                }
                self.policy_changed();
                Response::ok()
            }
            Command::StartStudySession {
                blocked_sites,
                allowed_sites,
            } => {
                self.policy.set_block_list(blocked_sites);
                self.policy.set_allow_list(allowed_sites);
                self.policy_changed();
                Response::ok()
            }
            Command::StopStudySession {
                blocked_sites,
                allowed_sites,
            } => {
                let touched = blocked_sites.is_some() || allowed_sites.is_some();
                if let Some(sites) = blocked_sites {
                    self.policy.set_block_list(sites);
                }
                if let Some(sites) = allowed_sites {
                    self.policy.set_allow_list(sites);
                }
                if touched {
                    self.policy_changed();
                }
                Response::ok()
            }
            Command::AddToBlockList { site } => {
                let edit = self.policy.add_to_block_list(&site);
                self.apply_edit(edit)
            }
            Command::AddToAllowList { site } => {
                let edit = self.policy.add_to_allow_list(&site);
                self.apply_edit(edit)
            }
            Command::RemoveFromBlockList { site } => {
                if self.policy.remove_from_block_list(&site) {
                    self.policy_changed();
                }
                Response::ok()
            }
            Command::RemoveFromAllowList { site } => {
                if self.policy.remove_from_allow_list(&site) {
                    self.policy_changed();
                }
                Response::ok()
            }
            Command::SetBlockingMode { mode } => {
                self.policy.set_mode(mode);
                self.policy_changed();
                Response::ok()
            }
            Command::SetDurations {
                study_minutes,
                short_break_minutes,
                long_break_minutes,
            } => match DurationConfig::new(study_minutes, short_break_minutes, long_break_minutes)
            {
                Ok(durations) => {
                    let event = self.timer.set_durations(durations);
                    self.apply_transition(Ok(Some(event)))
                }
                Err(e) => {
                    debug!(error = %e, "Durations rejected");
                    Response::failure(e.to_string())
                }
            },
            Command::GetPolicyState => Response::with_policy(self.policy.state().clone()),
            Command::CheckNavigation { url } => {
                Response::with_decision(self.decide_navigation(&url))
            }
        }
    }

    /// Hand over pending side effects.
    pub fn take_outbox(&mut self) -> Outbox {
        let outbox = std::mem::take(&mut self.outbox);
        if outbox.persist {
            self.last_checkpoint_ms = Some(self.clock.now_ms());
        }
        if outbox.rules.is_some() {
            self.rules_installed = true;
        }
        outbox
    }

    /// The last persist failed; write the full snapshot again next time.
    pub fn persist_failed(&mut self) {
        warn!("Snapshot not persisted; will retry");
        self.outbox.persist = true;
    }

    /// The last rule install failed; push the current rules again next time.
    pub fn rules_failed(&mut self) {
        warn!("Rules not installed; will retry");
        self.rules_installed = false;
        if self.outbox.rules.is_none() {
            self.outbox.rules = Some(self.rules.clone());
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_transition(
        &mut self,
        result: Result<Option<Event>, InvalidTransition>,
    ) -> Response {
        match result {
            Ok(Some(event)) => {
                self.outbox.events.push(event);
                self.changed();
                Response::ok()
            }
            Ok(None) => Response::ok(),
            Err(e) => {
                debug!(error = %e, "Invalid transition");
                Response::failure(e.to_string())
            }
        }
    }

    fn apply_edit(&mut self, edit: ListEdit) -> Response {
        if edit.changed() {
            self.policy_changed();
        }
        Response::with_edit(edit)
    }

    fn policy_changed(&mut self) {
        let state = self.policy.state();
        self.outbox.events.push(Event::PolicyChanged {
            blocking_mode: state.mode,
            blocked: state.block_list.len(),
            allowed: state.allow_list.len(),
            at: chrono::Utc::now(),
        });
        self.changed();
    }

    fn changed(&mut self) {
        self.outbox.persist = true;
        self.recompute();
    }

    /// Rebuild the decision context and rules from the engines.
    fn recompute(&mut self) {
        let session_active = self.timer.session_active();
        let is_break_time = self.timer.is_break_time();
        self.context = DecisionContext {
            session_active,
            is_break_time,
            policy: self.policy.state().clone(),
        };

        let rules = self.policy.compile_interception_rules(
            session_active,
            is_break_time,
            &self.settings.block_page_url,
        );
        if rules != self.rules || !self.rules_installed {
            self.outbox.events.push(Event::RulesUpdated {
                session_active,
                rule_count: rules.len(),
                needs_navigation_hook: rules.needs_navigation_hook,
                at: chrono::Utc::now(),
            });
            self.outbox.rules = Some(rules.clone());
        }
        self.rules = rules;
    }
}
