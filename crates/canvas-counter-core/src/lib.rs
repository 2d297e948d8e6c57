//! # Canvas Counter Core Library
//!
//! Core logic for Canvas Counter, a pomodoro timer with study gamification.
//! The CLI binary is a thin shell over this crate.
//!
//! ## Architecture
//!
//! - **Session engine**: the authoritative countdown. A synchronous state
//!   machine; the caller invokes `tick()` once per second while it runs
//! - **Gamification**: streak, XP, level and achievements, updated when a
//!   work session completes
//! - **Background context**: owns the engine and drives it, answering
//!   requests over a message channel
//! - **View sync**: polls the background and renders what it reports
//! - **Storage**: a two-partition key/value store (SQLite or in-memory) and
//!   TOML configuration
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: countdown state machine
//! - [`GamificationLedger`]: progress bookkeeping
//! - [`BackgroundContext`] / [`EngineClient`]: the running engine and its handle
//! - [`ViewSync`]: one synchronized view
//! - [`PersistentStore`]: storage seam

pub mod background;
pub mod clock;
pub mod error;
pub mod events;
pub mod gamification;
pub mod notify;
pub mod protocol;
pub mod reviews;
pub mod settings;
pub mod storage;
pub mod timer;
pub mod view;
pub mod visits;

pub use background::{BackgroundContext, Cadence, EngineClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConfigError, CoreError, StoreError, SyncError, ValidationError};
pub use events::Event;
pub use gamification::{AchievementId, GamificationLedger, GamificationState};
pub use notify::{LogSink, MemorySink, Notification, NotificationSink, Notifier};
pub use protocol::{Request, Response};
pub use reviews::{CourseEntry, CourseList};
pub use settings::{Settings, SettingsPatch};
pub use storage::{Config, EngineLock, MemoryStore, Partition, PersistentStore, SqliteStore, StoreExt};
pub use timer::{SessionEngine, SessionKind, Snapshot, TimerState};
pub use view::{ViewFrame, ViewHandle, ViewSync, ViewUpdate};
