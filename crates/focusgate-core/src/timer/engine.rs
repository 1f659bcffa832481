//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads and never reads the clock itself: every operation that
//! depends on time takes `now_ms`, and the caller is responsible for calling
//! `tick()` periodically.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> Idle
//!           |                               ^
//!           +-------- complete / reset -----+
//! ```
//!
//! While running, `remaining_seconds` is only a cache. The authoritative value
//! is always derived from `start_epoch_ms`, so time that passes while the
//! process is stopped is accounted for on the next reconcile.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(DurationConfig::default(), ModeCycle::default());
//! engine.start(now_ms)?;
//! // Once per second:
//! if let TickOutcome::Completed(event) = engine.tick(now_ms) { /* ... */ }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::schedule::{DurationConfig, ModeCycle, TimerMode};
use crate::error::InvalidTransition;
use crate::events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    /// Suspended mid-run. Elapsed time is frozen in `remaining_seconds`.
    Paused,
}

impl RunState {
    /// Rebuild from the persisted `running`/`paused` flags.
    ///
    /// A `paused` flag always wins, so snapshots written with both flags set
    /// still load as a paused session.
    pub fn from_flags(running: bool, paused: bool) -> Self {
        match (running, paused) {
            (_, true) => RunState::Paused,
            (true, false) => RunState::Running,
            (false, false) => RunState::Idle,
        }
    }

    pub fn running(self) -> bool {
        self == RunState::Running
    }

    pub fn paused(self) -> bool {
        self == RunState::Paused
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
        })
    }
}

/// Timer commands that can be rejected by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    Start,
    Pause,
    Resume,
}

impl std::fmt::Display for TimerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TimerAction::Start => "start",
            TimerAction::Pause => "pause",
            TimerAction::Resume => "resume",
        })
    }
}

/// The persisted subset of the timer state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub mode: TimerMode,
    pub run_state: RunState,
    pub remaining_seconds: u64,
    pub original_duration_seconds: u64,
    pub start_epoch_ms: Option<u64>,
    #[serde(default)]
    pub completed_study_sessions: u32,
}

/// What a single `tick()` observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not running; nothing to do.
    Idle,
    /// Still counting down.
    Counting { elapsed_secs: u64, remaining_secs: u64 },
    /// Reached zero and moved to the next mode.
    Completed(Event),
}

/// Core timer engine.
///
/// Operates on wall-clock deltas -- no internal thread.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    mode: TimerMode,
    run_state: RunState,
    /// Countdown value at last reconciliation.
    remaining_seconds: u64,
    /// Duration chosen when the current run began. Always > 0.
    original_duration_seconds: u64,
    /// Wall-clock instant (ms since epoch) the current run began, shifted
    /// back by whatever had already elapsed before the last resume.
    start_epoch_ms: Option<u64>,
    completed_study_sessions: u32,
    durations: DurationConfig,
    cycle: ModeCycle,
}

impl TimerEngine {
    /// Create an idle engine loaded with a study countdown.
    pub fn new(durations: DurationConfig, cycle: ModeCycle) -> Self {
        let secs = durations.seconds_for(TimerMode::Study);
        Self {
            mode: TimerMode::Study,
            run_state: RunState::Idle,
            remaining_seconds: secs,
            original_duration_seconds: secs,
            start_epoch_ms: None,
            completed_study_sessions: 0,
            durations,
            cycle,
        }
    }

    /// Rebuild an engine from a persisted record.
    ///
    /// A record that says the timer was running is reconciled against `now_ms`
    /// immediately. If the countdown expired while the process was stopped,
    /// the completion is synthesized here and its event returned.
    pub fn restore(
        record: TimerRecord,
        durations: DurationConfig,
        cycle: ModeCycle,
        now_ms: u64,
    ) -> (Self, Option<Event>) {
        let original = if record.original_duration_seconds == 0 {
            durations.seconds_for(record.mode)
        } else {
            record.original_duration_seconds
        };
        let remaining = record.remaining_seconds.min(original);

        let mut engine = Self {
            mode: record.mode,
            run_state: record.run_state,
            remaining_seconds: remaining,
            original_duration_seconds: original,
            start_epoch_ms: record.start_epoch_ms,
            completed_study_sessions: record.completed_study_sessions,
            durations,
            cycle,
        };

        if engine.run_state == RunState::Idle {
            engine.start_epoch_ms = None;
            return (engine, None);
        }

        if engine.run_state == RunState::Running {
            if engine.start_epoch_ms.is_none() {
                engine.start_epoch_ms = Some(engine.derived_start(now_ms));
            }
            if engine.reconcile(now_ms) {
                info!(
                    mode = %engine.mode,
                    "Countdown expired while stopped, completing on restore"
                );
                let event = engine.complete();
                return (engine, Some(event));
            }
            debug!(
                remaining = engine.remaining_seconds,
                "Restored running countdown"
            );
        }

        (engine, None)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn is_running(&self) -> bool {
        self.run_state.running()
    }

    pub fn is_paused(&self) -> bool {
        self.run_state.paused()
    }

    pub fn is_break_time(&self) -> bool {
        self.mode.is_break()
    }

    /// A focus session is active only while a study countdown is running.
    pub fn session_active(&self) -> bool {
        self.run_state == RunState::Running && self.mode == TimerMode::Study
    }

    /// Cached countdown value as of the last reconcile.
    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn original_duration_seconds(&self) -> u64 {
        self.original_duration_seconds
    }

    pub fn start_epoch_ms(&self) -> Option<u64> {
        self.start_epoch_ms
    }

    pub fn completed_study_sessions(&self) -> u32 {
        self.completed_study_sessions
    }

    pub fn durations(&self) -> DurationConfig {
        self.durations
    }

    pub fn cycle(&self) -> ModeCycle {
        self.cycle
    }

    /// Authoritative remaining time at `now_ms`, without touching the cache.
    pub fn remaining_at(&self, now_ms: u64) -> u64 {
        match (self.run_state, self.start_epoch_ms) {
            (RunState::Running, Some(start)) => self
                .original_duration_seconds
                .saturating_sub(elapsed_secs(start, now_ms)),
            _ => self.remaining_seconds,
        }
    }

    pub fn record(&self) -> TimerRecord {
        TimerRecord {
            mode: self.mode,
            run_state: self.run_state,
            remaining_seconds: self.remaining_seconds,
            original_duration_seconds: self.original_duration_seconds,
            start_epoch_ms: self.start_epoch_ms,
            completed_study_sessions: self.completed_study_sessions,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start a fresh run from idle, or continue a paused one.
    ///
    /// Returns `Ok(None)` when already running.
    pub fn start(&mut self, now_ms: u64) -> Result<Option<Event>, InvalidTransition> {
        match self.run_state {
            RunState::Running => {
                debug!("start ignored: already running");
                Ok(None)
            }
            RunState::Paused => Ok(Some(self.begin_run(now_ms, true))),
            RunState::Idle => {
                self.original_duration_seconds = self.remaining_seconds.max(1);
                self.remaining_seconds = self.original_duration_seconds;
                Ok(Some(self.begin_run(now_ms, false)))
            }
        }
    }

    pub fn pause(&mut self, now_ms: u64) -> Result<Option<Event>, InvalidTransition> {
        match self.run_state {
            RunState::Running => {
                self.reconcile(now_ms);
                // start_epoch_ms is kept for diagnostics but no longer authoritative.
                self.run_state = RunState::Paused;
                info!(mode = %self.mode, remaining = self.remaining_seconds, "Timer paused");
                Ok(Some(Event::TimerPaused {
                    mode: self.mode,
                    remaining_secs: self.remaining_seconds,
                    at: Utc::now(),
                }))
            }
            RunState::Paused => Ok(None),
            RunState::Idle => Err(InvalidTransition {
                from: self.run_state,
                action: TimerAction::Pause,
            }),
        }
    }

    pub fn resume(&mut self, now_ms: u64) -> Result<Option<Event>, InvalidTransition> {
        match self.run_state {
            RunState::Paused => Ok(Some(self.begin_run(now_ms, true))),
            RunState::Running => Ok(None),
            RunState::Idle => Err(InvalidTransition {
                from: self.run_state,
                action: TimerAction::Resume,
            }),
        }
    }

    /// Stop and reload the current mode. A missing or zero `explicit_secs`
    /// falls back to the configured duration.
    pub fn reset(&mut self, explicit_secs: Option<u64>) -> Event {
        let secs = self.duration_or_configured(self.mode, explicit_secs);
        self.load_idle(self.mode, secs);
        info!(mode = %self.mode, secs, "Timer reset");
        Event::TimerReset {
            mode: self.mode,
            remaining_secs: secs,
            at: Utc::now(),
        }
    }

    pub fn set_mode(&mut self, mode: TimerMode, explicit_secs: Option<u64>) -> Event {
        let from = self.mode;
        let secs = self.duration_or_configured(mode, explicit_secs);
        self.load_idle(mode, secs);
        info!(%from, to = %mode, secs, "Timer mode set");
        Event::ModeChanged {
            from,
            to: mode,
            remaining_secs: secs,
            at: Utc::now(),
        }
    }

    /// Replace the configured durations. An idle countdown picks up the new
    /// value for its mode right away; a running or paused one keeps its own.
    pub fn set_durations(&mut self, durations: DurationConfig) -> Event {
        self.durations = durations;
        if self.run_state == RunState::Idle {
            let secs = durations.seconds_for(self.mode);
            self.remaining_seconds = secs;
            self.original_duration_seconds = secs;
        }
        Event::DurationsChanged {
            durations,
            at: Utc::now(),
        }
    }

    pub fn set_cycle(&mut self, cycle: ModeCycle) {
        self.cycle = cycle;
    }

    /// Bring the cached countdown up to date with `now_ms`.
    ///
    /// Returns whether a running countdown has reached zero.
    pub fn reconcile(&mut self, now_ms: u64) -> bool {
        if self.run_state != RunState::Running || self.start_epoch_ms.is_none() {
            return false;
        }
        self.remaining_seconds = self.remaining_at(now_ms);
        self.remaining_seconds == 0
    }

    /// Call once per second.
    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        if self.run_state != RunState::Running {
            return TickOutcome::Idle;
        }
        if self.reconcile(now_ms) {
            return TickOutcome::Completed(self.complete());
        }
        TickOutcome::Counting {
            elapsed_secs: self
                .original_duration_seconds
                .saturating_sub(self.remaining_seconds),
            remaining_secs: self.remaining_seconds,
        }
    }

    /// Finish the current countdown and load the next mode, idle.
    pub fn complete(&mut self) -> Event {
        let finished = self.mode;
        if finished == TimerMode::Study {
            self.completed_study_sessions = self.completed_study_sessions.saturating_add(1);
        }
        let next = self
            .cycle
            .next_mode(finished, self.completed_study_sessions);
        let secs = self.durations.seconds_for(next);
        self.load_idle(next, secs);
        info!(%finished, %next, "Countdown complete");
        Event::TimerCompleted {
            finished,
            next,
            at: Utc::now(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_run(&mut self, now_ms: u64, resuming: bool) -> Event {
        self.start_epoch_ms = Some(self.derived_start(now_ms));
        self.run_state = RunState::Running;
        info!(
            mode = %self.mode,
            remaining = self.remaining_seconds,
            resuming,
            "Timer running"
        );
        if resuming {
            Event::TimerResumed {
                mode: self.mode,
                remaining_secs: self.remaining_seconds,
                at: Utc::now(),
            }
        } else {
            Event::TimerStarted {
                mode: self.mode,
                duration_secs: self.original_duration_seconds,
                remaining_secs: self.remaining_seconds,
                at: Utc::now(),
            }
        }
    }

    /// Start instant that makes `remaining_at(now_ms)` equal the cached value.
    fn derived_start(&self, now_ms: u64) -> u64 {
        let elapsed = self
            .original_duration_seconds
            .saturating_sub(self.remaining_seconds);
        now_ms.saturating_sub(elapsed.saturating_mul(1000))
    }

    fn duration_or_configured(&self, mode: TimerMode, explicit_secs: Option<u64>) -> u64 {
        explicit_secs
            .filter(|secs| *secs > 0)
            .unwrap_or_else(|| self.durations.seconds_for(mode))
    }

    fn load_idle(&mut self, mode: TimerMode, secs: u64) {
        self.mode = mode;
        self.run_state = RunState::Idle;
        self.start_epoch_ms = None;
        self.remaining_seconds = secs;
        self.original_duration_seconds = secs;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(DurationConfig::default(), ModeCycle::default())
    }
}

fn elapsed_secs(start_ms: u64, now_ms: u64) -> u64 {
    now_ms.saturating_sub(start_ms) / 1000
}
