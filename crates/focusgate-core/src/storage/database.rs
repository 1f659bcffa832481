//! SQLite-backed key-value store.
//!
//! Values are stored as JSON text in a single `kv` table, so the store holds
//! whatever the coordinator persists without schema changes. The async
//! [`PersistentStore`] methods run their queries on tokio's blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tokio::task;
use tracing::warn;

use super::{data_dir, PersistentStore};
use crate::error::StoreError;

/// SQLite database at `~/.config/focusgate/focusgate.db`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the database in the data directory.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
            .join("focusgate.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        with_conn(&store.conn, |conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
        })?;
        Ok(store)
    }

    /// Get a raw value from the kv table.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        with_conn(&self.conn, |conn| query_value(conn, key))
    }

    /// Set a raw value in the kv table.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        with_conn(&self.conn, |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Mutex<Connection>) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || f(&*conn))
            .await
            .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn with_conn<T>(
    conn: &Mutex<Connection>,
    f: impl FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
) -> Result<T, StoreError> {
    let mut conn = conn
        .lock()
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(f(&mut *conn)?)
}

fn query_value(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;
    match stmt.query_row(params![key], |row| row.get::<_, String>(0)) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Read `keys`, skipping any whose stored text is not JSON so the caller
/// falls back for that key alone.
fn read_entries(conn: &Mutex<Connection>, keys: &[String]) -> Result<Map<String, Value>, StoreError> {
    let raw = with_conn(conn, |conn| {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(text) = query_value(conn, key)? {
                found.push((key.clone(), text));
            }
        }
        Ok(found)
    })?;

    let mut out = Map::new();
    for (key, text) in raw {
        match serde_json::from_str(&text) {
            Ok(value) => {
                out.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "Skipping unreadable stored value"),
        }
    }
    Ok(out)
}

impl PersistentStore for SqliteStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        self.blocking(move |conn| read_entries(conn, &keys)).await
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        self.blocking(move |conn| {
            // Whole write in one transaction.
            with_conn(conn, |conn| {
                let tx = conn.transaction()?;
                {
                    let mut stmt =
                        tx.prepare("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
                    for (key, value) in &entries {
                        stmt.execute(params![key, value.to_string()])?;
                    }
                }
                tx.commit()
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Snapshot;
    use serde_json::json;

    #[test]
    fn kv_store() {
        let db = SqliteStore::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn json_values_round_trip_through_sqlite() {
        let db = SqliteStore::open_memory().unwrap();
        let mut entries = Map::new();
        entries.insert("blockList".into(), json!(["x.com", "y.com"]));
        entries.insert("running".into(), json!(true));
        entries.insert("startEpochMillis".into(), Value::Null);
        db.set(entries).await.unwrap();

        let got = db.get(&["blockList", "running", "startEpochMillis", "missing"]).await.unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got["blockList"], json!(["x.com", "y.com"]));
        assert_eq!(got["running"], json!(true));
        assert!(got["startEpochMillis"].is_null());
    }

    #[tokio::test]
    async fn unreadable_value_is_skipped_alone() {
        let db = SqliteStore::open_memory().unwrap();
        db.kv_set("mode", "{not json").unwrap();
        db.kv_set("running", "true").unwrap();

        let got = db.get(&["mode", "running"]).await.unwrap();
        assert!(!got.contains_key("mode"));
        assert_eq!(got["running"], json!(true));
    }

    #[tokio::test]
    async fn snapshot_survives_one_corrupt_key() {
        let db = SqliteStore::open_memory().unwrap();
        let mut snapshot = Snapshot::default();
        snapshot.policy.block_list.insert("x.com".into());
        snapshot.policy.allow_list.insert("docs.rs".into());
        snapshot.save(&db, 1_700_000_000_000).await.unwrap();

        db.kv_set("lastSaveTime", "{oops").unwrap();

        let loaded = Snapshot::load(&db).await.unwrap();
        assert!(loaded.policy.block_list.contains("x.com"));
        assert!(loaded.policy.allow_list.contains("docs.rs"));
        assert_eq!(loaded.last_save_time, None);
    }
}
