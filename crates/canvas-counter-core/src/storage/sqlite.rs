//! SQLite-backed [`PersistentStore`].
//!
//! One `kv` table keyed by `(partition, key)`; values are JSON text.

use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Mutex;

use super::{data_dir, Partition, PersistentStore};
use crate::error::{CoreError, StoreError};

/// SQLite database holding both partitions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at `<data_dir>/<file_name>`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open(file_name: &str) -> Result<Self, CoreError> {
        let path = data_dir()?.join(file_name);
        Ok(Self::open_at(&path)?)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                partition TEXT NOT NULL,
                key       TEXT NOT NULL,
                value     TEXT NOT NULL,
                PRIMARY KEY (partition, key)
            );",
        )?;
        Ok(())
    }
}

impl PersistentStore for SqliteStore {
    fn get(&self, partition: Partition, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let conn = self.conn.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE partition = ?1 AND key = ?2")?;

        let mut out = Map::new();
        for key in keys {
            let result = stmt.query_row(params![partition.as_str(), key], |row| {
                row.get::<_, String>(0)
            });
            let raw = match result {
                Ok(v) => v,
                Err(rusqlite::Error::QueryReturnedNoRows) => continue,
                Err(e) => return Err(e.into()),
            };
            let value = serde_json::from_str(&raw).map_err(|e| StoreError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
            out.insert(key.to_string(), value);
        }
        Ok(out)
    }

    fn set(&self, partition: Partition, entries: Map<String, Value>) -> Result<(), StoreError> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT OR REPLACE INTO kv (partition, key, value) VALUES (?1, ?2, ?3)",
                params![partition.as_str(), key, value.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
