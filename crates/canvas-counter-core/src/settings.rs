//! User settings kept in the synced partition.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::storage::{keys, read_or_default, Partition, PersistentStore};

/// Timer durations (whole minutes) and the notification switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

fn default_work_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            break_duration: default_break_duration(),
            notifications_enabled: true,
        }
    }
}

impl Settings {
    /// Load from the synced partition; defaults when absent or unreadable.
    ///
    /// A zero duration counts as malformed and falls back to its default.
    pub fn load(store: &dyn PersistentStore) -> Self {
        read_or_default::<Settings, _>(store, Partition::Synced, keys::SETTINGS).sanitized()
    }

    fn sanitized(mut self) -> Self {
        if self.work_duration == 0 {
            tracing::warn!("stored workDuration is 0, using default");
            self.work_duration = default_work_duration();
        }
        if self.break_duration == 0 {
            tracing::warn!("stored breakDuration is 0, using default");
            self.break_duration = default_break_duration();
        }
        self
    }

    /// Session length in seconds for the given session type.
    pub fn duration_secs(&self, is_work_session: bool) -> u32 {
        let minutes = if is_work_session {
            self.work_duration
        } else {
            self.break_duration
        };
        minutes.saturating_mul(60)
    }

    /// Returns a copy with every `Some` field of `patch` applied.
    ///
    /// # Errors
    /// Rejects zero durations; `self` is left untouched either way.
    pub fn merged(&self, patch: &SettingsPatch) -> Result<Settings, ValidationError> {
        for (field, value) in [
            ("workDuration", patch.work_duration),
            ("breakDuration", patch.break_duration),
        ] {
            if value == Some(0) {
                return Err(ValidationError::InvalidValue {
                    field: field.to_string(),
                    message: "must be a positive number of minutes".into(),
                });
            }
        }

        Ok(Settings {
            work_duration: patch.work_duration.unwrap_or(self.work_duration),
            break_duration: patch.break_duration.unwrap_or(self.break_duration),
            notifications_enabled: patch
                .notifications_enabled
                .unwrap_or(self.notifications_enabled),
        })
    }
}

/// Partial settings carried by an `updateSettings` request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
}

impl From<Settings> for SettingsPatch {
    fn from(s: Settings) -> Self {
        Self {
            work_duration: Some(s.work_duration),
            break_duration: Some(s.break_duration),
            notifications_enabled: Some(s.notifications_enabled),
        }
    }
}
