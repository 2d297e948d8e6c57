mod engine;

pub use engine::SessionEngine;

use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::storage::{keys, Partition, PersistentStore, StoreExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Work,
    Break,
}

impl SessionKind {
    pub fn from_is_work(is_work_session: bool) -> Self {
        if is_work_session {
            SessionKind::Work
        } else {
            SessionKind::Break
        }
    }

    pub fn is_work(&self) -> bool {
        matches!(self, SessionKind::Work)
    }

    pub fn next(&self) -> Self {
        match self {
            SessionKind::Work => SessionKind::Break,
            SessionKind::Break => SessionKind::Work,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Work => "Focus Time",
            SessionKind::Break => "Break Time",
        }
    }
}

/// Persisted countdown. Saved after every mutation so a restarted
/// background context can pick up where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub time_left: u32,
    pub is_running: bool,
    pub is_work_session: bool,
}

impl TimerState {
    /// Idle at the start of a work session.
    pub fn fresh(settings: &Settings) -> Self {
        Self {
            time_left: settings.duration_secs(true),
            is_running: false,
            is_work_session: true,
        }
    }

    pub fn session(&self) -> SessionKind {
        SessionKind::from_is_work(self.is_work_session)
    }

    /// Read from the local partition; `fresh` when absent or malformed.
    pub fn load(store: &dyn PersistentStore, settings: &Settings) -> Self {
        match store.read(Partition::Local, keys::TIMER_STATE) {
            Ok(Some(state)) => state,
            Ok(None) => Self::fresh(settings),
            Err(e) => {
                tracing::warn!(error = %e, "timer state unreadable, starting fresh");
                Self::fresh(settings)
            }
        }
    }
}

/// The full read contract for views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub time_left: u32,
    pub is_running: bool,
    pub is_work_session: bool,
    pub settings: Settings,
}

impl Snapshot {
    pub fn session(&self) -> SessionKind {
        SessionKind::from_is_work(self.is_work_session)
    }

    /// Length of the current session in seconds.
    pub fn total_secs(&self) -> u32 {
        self.settings.duration_secs(self.is_work_session)
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        let settings = Settings::default();
        let timer = TimerState::fresh(&settings);
        Self {
            time_left: timer.time_left,
            is_running: timer.is_running,
            is_work_session: timer.is_work_session,
            settings,
        }
    }
}
