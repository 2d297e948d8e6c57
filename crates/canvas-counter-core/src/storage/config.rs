//! TOML-based runtime configuration.
//!
//! Stores process-level knobs: tick and poll cadence, review reminder
//! schedule, log filter, database file name. User-facing timer settings are
//! *not* here; they live in the synced partition of the store (see
//! [`crate::settings::Settings`]).
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// Upper bound on any configured wait; larger values are clamped to it.
pub const MAX_WAIT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Background tick cadence.
    #[serde(default = "default_1000")]
    pub tick_interval_ms: u64,
    /// View poll cadence.
    #[serde(default = "default_1000")]
    pub poll_interval_ms: u64,
    /// Delay before the first course review check.
    #[serde(default = "default_review_check_delay")]
    pub review_check_delay_min: u64,
    /// Period of the course review check.
    #[serde(default = "default_review_check_interval")]
    pub review_check_interval_min: u64,
    /// `tracing` filter used when `CANVAS_COUNTER_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// SQLite file name inside the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_1000() -> u64 {
    1000
}
fn default_review_check_delay() -> u64 {
    1
}
fn default_review_check_interval() -> u64 {
    60
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_database_file() -> String {
    "canvas-counter.db".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_1000(),
            poll_interval_ms: default_1000(),
            review_check_delay_min: default_review_check_delay(),
            review_check_interval_min: default_review_check_interval(),
            log_filter: default_log_filter(),
            database_file: default_database_file(),
        }
    }
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path,
                message: e.to_string(),
            }),
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config unavailable, using defaults");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Get a config value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, keeping the existing value's type.
    /// Does not save; call [`Config::save`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| invalid("config is not a table".into()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| invalid("unknown config key".into()))?;

        let new_value = match existing {
            serde_json::Value::Number(_) => value
                .parse::<u64>()
                .map(|n| serde_json::Value::Number(n.into()))
                .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
            _ => serde_json::Value::String(value.into()),
        };
        obj.insert(key.to_string(), new_value);

        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1)).min(MAX_WAIT)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1)).min(MAX_WAIT)
    }

    pub fn review_check_delay(&self) -> Duration {
        minutes(self.review_check_delay_min)
    }

    pub fn review_check_interval(&self) -> Duration {
        minutes(self.review_check_interval_min.max(1))
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60)).min(MAX_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("poll_interval_ms = 250\n").unwrap();
        assert_eq!(parsed.poll_interval_ms, 250);
        assert_eq!(parsed.tick_interval_ms, 1000);
        assert_eq!(parsed.review_check_interval_min, 60);
    }

    #[test]
    fn get_returns_string_for_all_types() {
        let cfg = Config::default();
        assert_eq!(cfg.get("tick_interval_ms").as_deref(), Some("1000"));
        assert_eq!(cfg.get("log_filter").as_deref(), Some("info"));
        assert!(cfg.get("missing_key").is_none());
    }

    #[test]
    fn set_keeps_types() {
        let mut cfg = Config::default();
        cfg.set("review_check_interval_min", "30").unwrap();
        assert_eq!(cfg.review_check_interval_min, 30);
        cfg.set("log_filter", "debug").unwrap();
        assert_eq!(cfg.log_filter, "debug");
    }

    #[test]
    fn huge_intervals_are_clamped() {
        let mut cfg = Config::default();
        let max = u64::MAX.to_string();
        for key in [
            "review_check_delay_min",
            "review_check_interval_min",
            "tick_interval_ms",
            "poll_interval_ms",
        ] {
            cfg.set(key, &max).unwrap();
        }
        assert_eq!(cfg.review_check_delay(), MAX_WAIT);
        assert_eq!(cfg.review_check_interval(), MAX_WAIT);
        assert_eq!(cfg.tick_interval(), MAX_WAIT);
        assert_eq!(cfg.poll_interval(), MAX_WAIT);

        cfg.set("review_check_interval_min", "0").unwrap();
        assert_eq!(cfg.review_check_interval(), Duration::from_secs(60));
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_number() {
        let mut cfg = Config::default();
        assert!(cfg.set("nonexistent", "1").is_err());
        assert!(cfg.set("tick_interval_ms", "fast").is_err());
        assert_eq!(cfg.tick_interval_ms, 1000);
    }
}
