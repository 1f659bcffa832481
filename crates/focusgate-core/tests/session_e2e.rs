//! E2E tests for the session coordinator against real stores.
//!
//! These tests drive the coordinator through complete study/break cycles,
//! persist through the store the way the daemon does, and simulate a crash
//! by rebuilding a coordinator from whatever the store holds.
//!
//! | Scenario                    | Store        | Checks                                  |
//! |-----------------------------|--------------|-----------------------------------------|
//! | Full study cycle            | MemoryStore  | completion, break rules, persisted mode |
//! | Crash while running         | SqliteStore  | countdown continues from wall clock     |
//! | Crash past expiry           | SqliteStore  | completion synthesized on restore       |
//! | Paused across restart       | MemoryStore  | remaining frozen                        |
//! | Policy edits across restart | SqliteStore  | list order and mode preserved           |

use focusgate_core::policy::{BlockingMode, Decision, RuleSet};
use focusgate_core::session::{Command, CoordinatorSettings, SessionCoordinator};
use focusgate_core::storage::{MemoryStore, PersistentStore, Snapshot, SqliteStore};
use focusgate_core::timer::{ManualClock, RunState, TickOutcome, TimerMode};

const T0: u64 = 1_700_000_000_000;

// ============================================================================
// Test Helpers
// ============================================================================

fn coordinator(clock: &ManualClock) -> SessionCoordinator {
    SessionCoordinator::new(clock.clone(), CoordinatorSettings::default())
}

/// Persist the way the daemon flush does.
async fn flush<S: PersistentStore>(c: &mut SessionCoordinator, store: &S) {
    let outbox = c.take_outbox();
    if outbox.persist {
        c.snapshot().save(store, c.now_ms()).await.unwrap();
    }
}

/// A fresh process: new coordinator, state loaded from the store.
async fn restart<S: PersistentStore>(clock: &ManualClock, store: &S) -> SessionCoordinator {
    let mut c = coordinator(clock);
    c.restore(Snapshot::load(store).await.unwrap());
    c
}

fn block_sites(c: &mut SessionCoordinator, sites: &[&str]) {
    let response = c.handle(Command::UpdateWebsiteRules {
        blocked_sites: sites.iter().map(|s| s.to_string()).collect(),
        allowed_sites: vec![],
        blocking_mode: Some(BlockingMode::Blocklist),
    });
    assert!(response.success);
}

// ============================================================================
// Full cycle
// ============================================================================

#[tokio::test]
async fn test_full_study_cycle_blocks_then_releases() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut c = coordinator(&clock);

    block_sites(&mut c, &["x.com"]);
    assert!(c.handle(Command::StartTimer).success);
    flush(&mut c, &store).await;
    assert_eq!(c.decide_navigation("https://www.x.com/feed"), Decision::Block);
    assert_eq!(c.rules().len(), 2);

    // Ticking once a second for the whole run.
    let mut completions = 0;
    for _ in 0..1500 {
        clock.advance_secs(1);
        if let TickOutcome::Completed(_) = c.tick() {
            completions += 1;
        }
        flush(&mut c, &store).await;
    }
    assert_eq!(completions, 1);

    let view = c.handle(Command::GetTimerState).timer_state.unwrap();
    assert_eq!(view.mode, TimerMode::ShortBreak);
    assert!(!view.running);
    assert!(view.is_break_time);
    assert_eq!(view.remaining_seconds, 300);
    assert_eq!(view.completed_study_sessions, 1);
    assert_eq!(c.decide_navigation("x.com"), Decision::Allow);
    assert_eq!(c.rules(), &RuleSet::default());

    let persisted = Snapshot::load(&store).await.unwrap();
    assert_eq!(persisted.timer.mode, TimerMode::ShortBreak);
    assert_eq!(persisted.timer.remaining_seconds, 300);

    // Break runs out and study comes back.
    assert!(c.handle(Command::StartTimer).success);
    clock.advance_secs(300);
    assert!(matches!(c.tick(), TickOutcome::Completed(_)));
    assert_eq!(c.timer().mode(), TimerMode::Study);
    assert_eq!(c.timer().remaining_seconds(), 1500);
}

#[tokio::test]
async fn test_long_break_cycle_from_config() {
    let clock = ManualClock::new(T0);
    let mut config = focusgate_core::Config::default();
    config.timer.long_break_every = 2;
    let mut c = SessionCoordinator::new(clock.clone(), CoordinatorSettings::from_config(&config));

    let mut next_modes = Vec::new();
    for _ in 0..4 {
        c.handle(Command::SetMode {
            mode: TimerMode::Study,
            time_left: Some(60),
        });
        c.handle(Command::StartTimer);
        clock.advance_secs(60);
        c.tick();
        next_modes.push(c.timer().mode());
    }
    assert_eq!(
        next_modes,
        vec![
            TimerMode::ShortBreak,
            TimerMode::LongBreak,
            TimerMode::ShortBreak,
            TimerMode::LongBreak
        ]
    );
}

// ============================================================================
// Crash recovery
// ============================================================================

#[tokio::test]
async fn test_crash_while_running_continues_from_wall_clock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusgate.db");
    let clock = ManualClock::new(T0);

    {
        let store = SqliteStore::open_at(&path).unwrap();
        let mut c = coordinator(&clock);
        block_sites(&mut c, &["x.com"]);
        c.handle(Command::StartTimer);
        flush(&mut c, &store).await;
        clock.advance_secs(100);
        // Process dies here without another write.
    }

    clock.advance_secs(200);
    let store = SqliteStore::open_at(&path).unwrap();
    let c = restart(&clock, &store).await;

    assert_eq!(c.timer().run_state(), RunState::Running);
    assert_eq!(c.timer().remaining_seconds(), 1500 - 300);
    assert!(c.decision_context().session_active);
    assert_eq!(c.decide_navigation("x.com"), Decision::Block);
}

#[tokio::test]
async fn test_crash_past_expiry_completes_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusgate.db");
    let clock = ManualClock::new(T0);

    {
        let store = SqliteStore::open_at(&path).unwrap();
        let mut c = coordinator(&clock);
        c.handle(Command::SetMode {
            mode: TimerMode::Study,
            time_left: Some(25),
        });
        c.handle(Command::StartTimer);
        flush(&mut c, &store).await;
    }

    clock.advance_secs(40);
    let store = SqliteStore::open_at(&path).unwrap();
    let mut c = restart(&clock, &store).await;

    assert_eq!(c.timer().mode(), TimerMode::ShortBreak);
    assert_eq!(c.timer().run_state(), RunState::Idle);
    assert_eq!(c.timer().remaining_seconds(), 300);

    let outbox = c.take_outbox();
    assert!(outbox.persist);
    assert_eq!(
        outbox
            .events
            .iter()
            .filter(|e| e.kind() == "timerComplete")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_paused_timer_survives_restart_frozen() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    let mut c = coordinator(&clock);

    c.handle(Command::StartTimer);
    clock.advance_secs(90);
    c.handle(Command::PauseTimer);
    flush(&mut c, &store).await;

    clock.advance_secs(3600);
    let mut c = restart(&clock, &store).await;
    assert_eq!(c.timer().run_state(), RunState::Paused);
    assert_eq!(c.timer().remaining_seconds(), 1410);

    c.handle(Command::ResumeTimer);
    clock.advance_secs(10);
    let view = c.handle(Command::GetTimerState).timer_state.unwrap();
    assert_eq!(view.remaining_seconds, 1400);
}

#[tokio::test]
async fn test_policy_edits_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focusgate.db");
    let clock = ManualClock::new(T0);

    {
        let store = SqliteStore::open_at(&path).unwrap();
        let mut c = coordinator(&clock);
        for site in ["b.com", "https://www.a.com/x", "c.com"] {
            c.handle(Command::AddToBlockList { site: site.into() });
        }
        c.handle(Command::AddToAllowList { site: "docs.rs".into() });
        c.handle(Command::SetBlockingMode {
            mode: BlockingMode::Allowlist,
        });
        c.handle(Command::SetDurations {
            study_minutes: 45,
            short_break_minutes: 10,
            long_break_minutes: 20,
        });
        flush(&mut c, &store).await;
    }

    let store = SqliteStore::open_at(&path).unwrap();
    let c = restart(&clock, &store).await;

    let blocked: Vec<&str> = c.policy().block_list().iter().map(String::as_str).collect();
    assert_eq!(blocked, vec!["b.com", "a.com", "c.com"]);
    assert!(c.policy().allow_list().contains("docs.rs"));
    assert_eq!(c.policy().mode(), BlockingMode::Allowlist);
    assert_eq!(c.timer().durations().study_minutes, 45);
    assert_eq!(c.timer().remaining_seconds(), 45 * 60);
}

#[tokio::test]
async fn test_store_failure_keeps_memory_authoritative() {
    let clock = ManualClock::new(T0);
    let store = MemoryStore::new();
    store.set_fail_writes(true);
    let mut c = coordinator(&clock);

    c.handle(Command::StartTimer);
    let outbox = c.take_outbox();
    assert!(outbox.persist);
    assert!(c.snapshot().save(&store, c.now_ms()).await.is_err());
    c.persist_failed();

    assert!(c.timer().is_running());
    store.set_fail_writes(false);
    flush(&mut c, &store).await;
    assert_eq!(
        Snapshot::load(&store).await.unwrap().timer.run_state,
        RunState::Running
    );
}
