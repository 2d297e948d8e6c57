//! Core error types for canvas-counter-core.
//!
//! None of these are fatal for the session engine: storage failures are
//! logged and swallowed by the engine and ledger, and messaging failures are
//! logged at the view. The types exist so that the seams which *can* fail
//! (store backends, config files, the message channel) report precisely.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for canvas-counter-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Cross-context messaging errors
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,

    /// A stored value could not be encoded or decoded
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The store handle was poisoned by a panicking writer
    #[error("Store handle poisoned")]
    Poisoned,

    /// Another process owns the session engine for this data directory
    #[error("Engine lock {path} is held by another process (is `canvas-counter run` active?)")]
    EngineBusy { path: PathBuf },

    /// The engine lock file could not be opened
    #[error("Cannot open engine lock {path}: {source}")]
    LockFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown or malformed key
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// The data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// No entry with that id
    #[error("No course with id {0}")]
    UnknownCourse(i64),
}

/// Errors seen by a foreground view talking to the background context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The background context is gone or its channel is closed
    #[error("background context unreachable")]
    Unreachable,

    /// The background answered with an error payload
    #[error("background rejected request: {0}")]
    Rejected(String),

    /// The background answered with a response of the wrong shape
    #[error("unexpected response to {0}")]
    UnexpectedResponse(&'static str),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
