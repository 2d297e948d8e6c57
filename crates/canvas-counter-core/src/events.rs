use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gamification::AchievementId;
use crate::settings::Settings;
use crate::timer::SessionKind;

/// Every state change in the session engine produces an Event.
/// The background context logs and broadcasts them; views still poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session: SessionKind,
        time_left: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        session: SessionKind,
        time_left: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        session: SessionKind,
        time_left: u32,
        at: DateTime<Utc>,
    },
    /// A session ran out and the engine moved to the next one.
    SessionCompleted {
        finished: SessionKind,
        next: SessionKind,
        next_time_left: u32,
        at: DateTime<Utc>,
    },
    SettingsUpdated {
        settings: Settings,
        at: DateTime<Utc>,
    },
    StreakUpdated {
        streak: u32,
        at: DateTime<Utc>,
    },
    XpAwarded {
        gained: u32,
        streak_bonus: u32,
        level: u32,
        xp: u32,
        at: DateTime<Utc>,
    },
    LevelUp {
        level: u32,
        at: DateTime<Utc>,
    },
    AchievementsUnlocked {
        achievements: Vec<AchievementId>,
        at: DateTime<Utc>,
    },
}
