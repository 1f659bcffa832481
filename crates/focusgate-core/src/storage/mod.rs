mod config;
pub mod database;
pub mod memory;
pub mod snapshot;

pub use config::{Config, InterceptorConfig, TimerConfig};
pub use database::SqliteStore;
pub use memory::MemoryStore;
pub use snapshot::{Snapshot, SNAPSHOT_KEYS};

use std::future::Future;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::error::{ConfigError, StoreError};

/// Flat key-value persistence shared by every component.
///
/// Values are JSON. `get` returns only the keys that exist; `set` merges the
/// given entries into the store, leaving other keys untouched.
pub trait PersistentStore: Send + Sync {
    fn get(
        &self,
        keys: &[&str],
    ) -> impl Future<Output = Result<Map<String, Value>, StoreError>> + Send;

    fn set(&self, entries: Map<String, Value>)
        -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Returns `~/.config/focusgate[-dev]/` based on FOCUSGATE_ENV.
///
/// Set FOCUSGATE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSGATE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusgate-dev")
    } else {
        base_dir.join("focusgate")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
