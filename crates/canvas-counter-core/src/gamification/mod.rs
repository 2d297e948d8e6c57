//! Streaks, XP/levels and achievements.
//!
//! [`GamificationLedger`] holds the authoritative [`GamificationState`] in
//! memory while the background context is alive and persists every change
//! to the local partition. Views read the same keys straight from the store.

mod achievements;
mod progress;

pub use achievements::{unlock_message, AchievementId, Achievements, Requirement};
pub use progress::{accrue, next_streak, streak_bonus, xp_threshold, Accrual, StreakChange};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::clock::Clock;
use crate::notify::Notifier;
use crate::storage::{keys, write_logged, Partition, PersistentStore};

/// XP for one completed work session, before the streak bonus.
pub const BASE_SESSION_XP: u32 = 25;

/// Persisted progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationState {
    pub level: u32,
    pub xp: u32,
    pub streak: u32,
    pub last_session_date: Option<NaiveDate>,
    pub achievements: Achievements,
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            level: 1,
            xp: 0,
            streak: 0,
            last_session_date: None,
            achievements: Achievements::default(),
        }
    }
}

impl GamificationState {
    /// Read every gamification key from the local partition.
    ///
    /// Each key falls back on its own: a corrupt `achievements` blob does
    /// not reset `level`. A stored level of 0 reads as 1.
    pub fn load(store: &dyn PersistentStore) -> Self {
        let found = match store.get(
            Partition::Local,
            &[
                keys::LEVEL,
                keys::XP,
                keys::STREAK,
                keys::LAST_SESSION_DATE,
                keys::ACHIEVEMENTS,
            ],
        ) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "gamification state unreadable, using defaults");
                return Self::default();
            }
        };

        Self {
            level: field::<u32>(&found, keys::LEVEL).unwrap_or(1).max(1),
            xp: field(&found, keys::XP).unwrap_or(0),
            streak: field(&found, keys::STREAK).unwrap_or(0),
            last_session_date: field(&found, keys::LAST_SESSION_DATE),
            achievements: field(&found, keys::ACHIEVEMENTS).unwrap_or_default(),
        }
    }

    pub fn xp_to_next_level(&self) -> u32 {
        xp_threshold(self.level)
    }
}

fn field<T: DeserializeOwned>(found: &Map<String, Value>, key: &str) -> Option<T> {
    let value = found.get(key)?;
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, error = %e, "malformed gamification field, using default");
            None
        }
    }
}

/// Outcome of [`GamificationLedger::add_xp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub base: u32,
    pub streak_bonus: u32,
    pub level_before: u32,
    pub level: u32,
    pub xp: u32,
}

impl XpAward {
    pub fn gained(&self) -> u32 {
        self.base + self.streak_bonus
    }

    pub fn leveled_up(&self) -> bool {
        self.level > self.level_before
    }
}

/// Everything a completed work session did to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReward {
    pub streak: u32,
    pub streak_change: StreakChange,
    pub award: XpAward,
    pub unlocked: Vec<AchievementId>,
}

pub struct GamificationLedger {
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    state: GamificationState,
}

impl GamificationLedger {
    /// Load persisted progress.
    pub fn load(store: Arc<dyn PersistentStore>, clock: Arc<dyn Clock>) -> Self {
        let state = GamificationState::load(&*store);
        Self {
            store,
            clock,
            state,
        }
    }

    pub fn state(&self) -> &GamificationState {
        &self.state
    }

    /// Count today toward the streak; at most once per calendar day.
    pub fn increment_streak(&mut self) -> (u32, StreakChange) {
        let today = self.clock.today();
        let (streak, change) = next_streak(
            self.state.streak,
            self.state.last_session_date,
            today,
            self.clock.yesterday(),
        );
        if change == StreakChange::AlreadyCounted {
            return (streak, change);
        }

        self.state.streak = streak;
        self.state.last_session_date = Some(today);

        let mut entries = Map::new();
        entries.insert(keys::STREAK.into(), Value::from(streak));
        entries.insert(
            keys::LAST_SESSION_DATE.into(),
            Value::String(today.format("%Y-%m-%d").to_string()),
        );
        if let Err(e) = self.store.set(Partition::Local, entries) {
            tracing::warn!(error = %e, "failed to persist streak");
        }

        tracing::info!(streak, ?change, "streak updated");
        (streak, change)
    }

    /// Award `base` plus the streak bonus and roll levels over.
    pub fn add_xp(&mut self, base: u32, notifier: &Notifier) -> XpAward {
        let bonus = streak_bonus(self.state.streak);
        let level_before = self.state.level;
        let accrual = accrue(self.state.level, self.state.xp, base + bonus);

        self.state.level = accrual.level;
        self.state.xp = accrual.xp;

        let mut entries = Map::new();
        entries.insert(keys::LEVEL.into(), Value::from(accrual.level));
        entries.insert(keys::XP.into(), Value::from(accrual.xp));
        if let Err(e) = self.store.set(Partition::Local, entries) {
            tracing::warn!(error = %e, "failed to persist xp");
        }

        if accrual.levels_gained > 0 {
            tracing::info!(level = accrual.level, "level up");
            notifier.send("🎉 Level Up!", format!("You reached level {}!", accrual.level));
        }
        if bonus > 0 {
            notifier.send(
                "🔥 Streak Bonus!",
                format!("+{bonus} XP for your {}-day streak!", self.state.streak),
            );
        }

        XpAward {
            base,
            streak_bonus: bonus,
            level_before,
            level: accrual.level,
            xp: accrual.xp,
        }
    }

    /// Unlock everything the current streak earns; one notification per call.
    pub fn check_achievements(&mut self, notifier: &Notifier) -> Vec<AchievementId> {
        let unlocked = self.state.achievements.evaluate(self.state.streak);
        if unlocked.is_empty() {
            return unlocked;
        }

        write_logged(
            &*self.store,
            Partition::Local,
            keys::ACHIEVEMENTS,
            &self.state.achievements,
        );
        tracing::info!(?unlocked, "achievements unlocked");
        notifier.send("🏆 Achievement Unlocked!", unlock_message(&unlocked));
        unlocked
    }

    /// Streak, then XP, then achievements: the work-session completion path.
    pub fn reward_work_session(&mut self, notifier: &Notifier) -> SessionReward {
        let (streak, streak_change) = self.increment_streak();
        let award = self.add_xp(BASE_SESSION_XP, notifier);
        let unlocked = self.check_achievements(notifier);
        SessionReward {
            streak,
            streak_change,
            award,
            unlocked,
        }
    }
}
