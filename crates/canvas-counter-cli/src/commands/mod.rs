pub mod config;
pub mod course;
pub mod run;
pub mod settings;
pub mod stats;
pub mod timer;
pub mod visit;

use canvas_counter_core::notify::NotificationSink;
use canvas_counter_core::{
    Config, CoreError, EngineLock, Notification, PersistentStore, SessionEngine, SqliteStore,
    StoreError, SystemClock,
};
use serde::Serialize;
use std::sync::Arc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Prints notifications to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl NotificationSink for TerminalSink {
    fn notify(&self, notification: Notification) {
        println!("🔔 {}: {}", notification.title, notification.message);
    }
}

pub fn open_store(config: &Config) -> Result<Arc<dyn PersistentStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open(&config.database_file)?))
}

/// Take ownership of the engine for this data directory.
///
/// Held by `run` for its whole lifetime and by mutating one-shot commands
/// for theirs, so only one engine ever writes the timer state.
pub fn lock_engine() -> Result<EngineLock, Box<dyn std::error::Error>> {
    match EngineLock::acquire() {
        Ok(lock) => Ok(lock),
        Err(CoreError::Store(StoreError::EngineBusy { .. })) => Err(
            "`canvas-counter run` is active; use its controls (t/r) instead".into(),
        ),
        Err(e) => Err(e.into()),
    }
}

/// An engine over the on-disk store, for one-shot commands.
///
/// Read-only use needs no lock; callers that mutate take [`lock_engine`]
/// first.
pub fn load_engine(config: &Config) -> Result<SessionEngine, Box<dyn std::error::Error>> {
    Ok(SessionEngine::load(
        open_store(config)?,
        Arc::new(TerminalSink),
        Arc::new(SystemClock),
    ))
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
