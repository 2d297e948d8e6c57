//! Key-value persistence with a synced and a local partition.
//!
//! The store is a leaf: it has no knowledge of timers or XP. Values are
//! JSON documents addressed by `(partition, key)`. Typed access goes through
//! [`StoreExt`], and [`read_or_default`] implements the "missing or malformed
//! means default" rule used by every caller in this crate.

mod config;
mod lock;
mod memory;
mod sqlite;

pub use config::Config;
pub use lock::EngineLock;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::error::{ConfigError, StoreError};

/// Persisted key names.
pub mod keys {
    /// Synced partition.
    pub const SETTINGS: &str = "settings";

    /// Local partition.
    pub const TIMER_STATE: &str = "timerState";
    pub const STREAK: &str = "streak";
    pub const LAST_SESSION_DATE: &str = "lastSessionDate";
    pub const LEVEL: &str = "level";
    pub const XP: &str = "xp";
    pub const ACHIEVEMENTS: &str = "achievements";
    pub const COURSES: &str = "courses";
    pub const LAST_CANVAS_VISIT: &str = "lastCanvasVisit";
}

/// Storage partition.
///
/// `Synced` holds user settings that may be replicated across devices by
/// something outside this process; `Local` holds everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Synced,
    Local,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Synced => "synced",
            Partition::Local => "local",
        }
    }
}

/// Durable key-value storage.
///
/// Implementations are shared between the background context and any number
/// of views, so they take `&self` and synchronize internally.
pub trait PersistentStore: Send + Sync {
    /// Read the subset of `keys` that exist in `partition`.
    /// Absent keys are simply missing from the returned map.
    fn get(&self, partition: Partition, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Write every entry of `entries` into `partition`, replacing old values.
    fn set(&self, partition: Partition, entries: Map<String, Value>) -> Result<(), StoreError>;
}

/// Typed helpers over any [`PersistentStore`].
pub trait StoreExt {
    /// Read and decode one key. `Ok(None)` when the key is absent.
    fn read<T: DeserializeOwned>(&self, partition: Partition, key: &str)
        -> Result<Option<T>, StoreError>;

    /// Encode and write one key.
    fn write<T: Serialize>(&self, partition: Partition, key: &str, value: &T)
        -> Result<(), StoreError>;
}

impl<S: PersistentStore + ?Sized> StoreExt for S {
    fn read<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let mut found = self.get(partition, &[key])?;
        match found.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| StoreError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    fn write<T: Serialize>(
        &self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let mut entries = Map::new();
        entries.insert(key.to_string(), value);
        self.set(partition, entries)
    }
}

/// Read one key, falling back to `T::default()` when it is absent,
/// malformed, or the store cannot be read.
pub fn read_or_default<T, S>(store: &S, partition: Partition, key: &str) -> T
where
    T: DeserializeOwned + Default,
    S: PersistentStore + ?Sized,
{
    match store.read(partition, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(partition = partition.as_str(), key, error = %e, "store read failed, using default");
            T::default()
        }
    }
}

/// Write one key, logging instead of propagating a failure.
///
/// In-memory state is authoritative; a failed write is picked up by the
/// next successful one.
pub fn write_logged<T, S>(store: &S, partition: Partition, key: &str, value: &T)
where
    T: Serialize,
    S: PersistentStore + ?Sized,
{
    if let Err(e) = store.write(partition, key, value) {
        tracing::warn!(partition = partition.as_str(), key, error = %e, "store write failed");
    }
}

/// Returns the data directory.
///
/// `CANVAS_COUNTER_HOME` wins when set. Otherwise `~/.config/canvas-counter[-dev]/`
/// based on `CANVAS_COUNTER_ENV` (set it to `dev` for a development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("CANVAS_COUNTER_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("CANVAS_COUNTER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("canvas-counter-dev")
            } else {
                base_dir.join("canvas-counter")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
