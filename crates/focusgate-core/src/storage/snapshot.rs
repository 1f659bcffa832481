//! The persisted surface of the whole system.
//!
//! A snapshot is written as a flat set of camelCase keys. Loading is
//! tolerant: a missing key takes its default and a malformed one is logged
//! and ignored, so a damaged store never keeps the daemon from starting.

use indexmap::IndexSet;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::warn;

use super::PersistentStore;
use crate::error::StoreError;
use crate::policy::{BlockingMode, PolicyState};
use crate::timer::{DurationConfig, RunState, TimerEngine, TimerMode, TimerRecord};

pub const KEY_RUNNING: &str = "running";
pub const KEY_PAUSED: &str = "paused";
pub const KEY_REMAINING: &str = "remainingSeconds";
pub const KEY_IS_BREAK: &str = "isBreakTime";
pub const KEY_MODE: &str = "mode";
pub const KEY_START: &str = "startEpochMillis";
pub const KEY_ORIGINAL: &str = "originalDurationSeconds";
pub const KEY_LAST_SAVE: &str = "lastSaveTime";
pub const KEY_BLOCK_LIST: &str = "blockList";
pub const KEY_ALLOW_LIST: &str = "allowList";
pub const KEY_BLOCKING_MODE: &str = "blockingMode";
pub const KEY_STUDY_MINUTES: &str = "studyMinutes";
pub const KEY_SHORT_BREAK_MINUTES: &str = "shortBreakMinutes";
pub const KEY_LONG_BREAK_MINUTES: &str = "longBreakMinutes";
pub const KEY_COMPLETED_STUDIES: &str = "completedStudySessions";

/// Every key a snapshot reads or writes.
pub const SNAPSHOT_KEYS: &[&str] = &[
    KEY_RUNNING,
    KEY_PAUSED,
    KEY_REMAINING,
    KEY_IS_BREAK,
    KEY_MODE,
    KEY_START,
    KEY_ORIGINAL,
    KEY_LAST_SAVE,
    KEY_BLOCK_LIST,
    KEY_ALLOW_LIST,
    KEY_BLOCKING_MODE,
    KEY_STUDY_MINUTES,
    KEY_SHORT_BREAK_MINUTES,
    KEY_LONG_BREAK_MINUTES,
    KEY_COMPLETED_STUDIES,
];

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub timer: TimerRecord,
    pub policy: PolicyState,
    pub durations: DurationConfig,
    /// Wall-clock ms of the write that produced this snapshot.
    pub last_save_time: Option<u64>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            timer: TimerEngine::default().record(),
            policy: PolicyState::default(),
            durations: DurationConfig::default(),
            last_save_time: None,
        }
    }
}

impl Snapshot {
    /// Flatten into store entries stamped with `now_ms`.
    pub fn to_entries(&self, now_ms: u64) -> Map<String, Value> {
        let timer = &self.timer;
        let mut entries = Map::new();
        entries.insert(KEY_RUNNING.into(), json!(timer.run_state.running()));
        entries.insert(KEY_PAUSED.into(), json!(timer.run_state.paused()));
        entries.insert(KEY_REMAINING.into(), json!(timer.remaining_seconds));
        entries.insert(KEY_IS_BREAK.into(), json!(timer.mode.is_break()));
        entries.insert(KEY_MODE.into(), json!(timer.mode));
        entries.insert(KEY_START.into(), json!(timer.start_epoch_ms));
        entries.insert(KEY_ORIGINAL.into(), json!(timer.original_duration_seconds));
        entries.insert(KEY_LAST_SAVE.into(), json!(now_ms));
        entries.insert(KEY_BLOCK_LIST.into(), json!(self.policy.block_list));
        entries.insert(KEY_ALLOW_LIST.into(), json!(self.policy.allow_list));
        entries.insert(KEY_BLOCKING_MODE.into(), json!(self.policy.mode));
        entries.insert(KEY_STUDY_MINUTES.into(), json!(self.durations.study_minutes));
        entries.insert(
            KEY_SHORT_BREAK_MINUTES.into(),
            json!(self.durations.short_break_minutes),
        );
        entries.insert(
            KEY_LONG_BREAK_MINUTES.into(),
            json!(self.durations.long_break_minutes),
        );
        entries.insert(
            KEY_COMPLETED_STUDIES.into(),
            json!(timer.completed_study_sessions),
        );
        entries
    }

    /// Rebuild from store entries, falling back to defaults key by key.
    pub fn from_entries(entries: &Map<String, Value>) -> Self {
        let defaults = Snapshot::default();

        let durations = {
            let d = defaults.durations;
            let candidate = DurationConfig {
                study_minutes: field(entries, KEY_STUDY_MINUTES).unwrap_or(d.study_minutes),
                short_break_minutes: field(entries, KEY_SHORT_BREAK_MINUTES)
                    .unwrap_or(d.short_break_minutes),
                long_break_minutes: field(entries, KEY_LONG_BREAK_MINUTES)
                    .unwrap_or(d.long_break_minutes),
            };
            match candidate.validate() {
                Ok(()) => candidate,
                Err(e) => {
                    warn!(error = %e, "Ignoring stored durations");
                    d
                }
            }
        };

        // Older snapshots carry only the break flag.
        let mode = field::<TimerMode>(entries, KEY_MODE).unwrap_or_else(|| {
            if field::<bool>(entries, KEY_IS_BREAK).unwrap_or(false) {
                TimerMode::ShortBreak
            } else {
                TimerMode::Study
            }
        });

        let run_state = RunState::from_flags(
            field(entries, KEY_RUNNING).unwrap_or(false),
            field(entries, KEY_PAUSED).unwrap_or(false),
        );
        let configured = durations.seconds_for(mode);
        let timer = TimerRecord {
            mode,
            run_state,
            remaining_seconds: field(entries, KEY_REMAINING).unwrap_or(configured),
            original_duration_seconds: field(entries, KEY_ORIGINAL).unwrap_or(configured),
            start_epoch_ms: field(entries, KEY_START),
            completed_study_sessions: field(entries, KEY_COMPLETED_STUDIES).unwrap_or(0),
        };

        let policy = PolicyState {
            block_list: field::<IndexSet<String>>(entries, KEY_BLOCK_LIST).unwrap_or_default(),
            allow_list: field::<IndexSet<String>>(entries, KEY_ALLOW_LIST).unwrap_or_default(),
            mode: field::<BlockingMode>(entries, KEY_BLOCKING_MODE).unwrap_or_default(),
        };

        Self {
            timer,
            policy,
            durations,
            last_save_time: field(entries, KEY_LAST_SAVE),
        }
    }

    /// Read the snapshot from a store.
    pub async fn load<S: PersistentStore>(store: &S) -> Result<Self, StoreError> {
        let entries = store.get(SNAPSHOT_KEYS).await?;
        Ok(Self::from_entries(&entries))
    }

    /// Write the full snapshot to a store.
    pub async fn save<S: PersistentStore>(&self, store: &S, now_ms: u64) -> Result<(), StoreError> {
        store.set(self.to_entries(now_ms)).await
    }
}

fn field<T: DeserializeOwned>(entries: &Map<String, Value>, key: &str) -> Option<T> {
    let value = entries.get(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, error = %e, "Ignoring malformed stored value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn sample() -> Snapshot {
        let mut policy = PolicyState::default();
        policy.block_list.insert("x.com".into());
        policy.allow_list.insert("docs.rs".into());
        policy.mode = BlockingMode::Allowlist;
        Snapshot {
            timer: TimerRecord {
                mode: TimerMode::ShortBreak,
                run_state: RunState::Running,
                remaining_seconds: 120,
                original_duration_seconds: 300,
                start_epoch_ms: Some(1_000_000),
                completed_study_sessions: 3,
            },
            policy,
            durations: DurationConfig::new(50, 10, 20).unwrap(),
            last_save_time: None,
        }
    }

    #[test]
    fn entries_use_the_persisted_key_names() {
        let entries = sample().to_entries(42);
        for key in SNAPSHOT_KEYS {
            assert!(entries.contains_key(*key), "missing {key}");
        }
        assert_eq!(entries[KEY_RUNNING], json!(true));
        assert_eq!(entries[KEY_PAUSED], json!(false));
        assert_eq!(entries[KEY_IS_BREAK], json!(true));
        assert_eq!(entries[KEY_MODE], json!("shortBreak"));
        assert_eq!(entries[KEY_BLOCKING_MODE], json!("allowlist"));
        assert_eq!(entries[KEY_LAST_SAVE], json!(42));
    }

    #[tokio::test]
    async fn save_then_load_restores_everything() {
        let store = MemoryStore::new();
        let snapshot = sample();
        snapshot.save(&store, 42).await.unwrap();

        let loaded = Snapshot::load(&store).await.unwrap();
        assert_eq!(loaded.timer, snapshot.timer);
        assert_eq!(loaded.policy, snapshot.policy);
        assert_eq!(loaded.durations, snapshot.durations);
        assert_eq!(loaded.last_save_time, Some(42));
    }

    #[test]
    fn empty_store_yields_defaults() {
        let loaded = Snapshot::from_entries(&Map::new());
        assert_eq!(loaded, Snapshot::default());
    }

    #[test]
    fn malformed_values_fall_back_per_key() {
        let mut entries = sample().to_entries(0);
        entries.insert(KEY_MODE.into(), json!("nap"));
        entries.insert(KEY_BLOCK_LIST.into(), json!(17));
        entries.insert(KEY_STUDY_MINUTES.into(), json!(0));

        let loaded = Snapshot::from_entries(&entries);
        // isBreakTime is still true, so the mode falls back to a break.
        assert_eq!(loaded.timer.mode, TimerMode::ShortBreak);
        assert!(loaded.policy.block_list.is_empty());
        assert!(loaded.policy.allow_list.contains("docs.rs"));
        assert_eq!(loaded.durations, DurationConfig::default());
        assert_eq!(loaded.timer.remaining_seconds, 120);
    }

    #[test]
    fn both_flags_set_loads_as_paused() {
        let mut entries = sample().to_entries(0);
        entries.insert(KEY_PAUSED.into(), json!(true));
        let loaded = Snapshot::from_entries(&entries);
        assert_eq!(loaded.timer.run_state, RunState::Paused);
    }

    #[test]
    fn null_start_means_no_start() {
        let mut entries = sample().to_entries(0);
        entries.insert(KEY_START.into(), Value::Null);
        let loaded = Snapshot::from_entries(&entries);
        assert_eq!(loaded.timer.start_epoch_ms, None);
    }
}
