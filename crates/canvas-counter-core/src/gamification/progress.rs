//! Pure streak and XP arithmetic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// XP needed to leave `level`.
pub fn xp_threshold(level: u32) -> u32 {
    level.max(1).saturating_mul(50)
}

/// Extra XP per completed work session for the current streak.
pub fn streak_bonus(streak: u32) -> u32 {
    match streak {
        0..=1 => 0,
        2..=3 => 5,
        4..=7 => 10,
        8..=14 => 15,
        15..=30 => 25,
        _ => 35,
    }
}

/// How a streak reacted to a completed work session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// A session was already counted today; nothing changed.
    AlreadyCounted,
    /// Last session was yesterday; streak grew by one.
    Extended,
    /// First session ever, or the chain broke; streak is now 1.
    Restarted,
}

/// Next `(streak, change)` for a session completed on `today`.
pub fn next_streak(
    streak: u32,
    last_session: Option<NaiveDate>,
    today: NaiveDate,
    yesterday: NaiveDate,
) -> (u32, StreakChange) {
    match last_session {
        Some(d) if d == today => (streak, StreakChange::AlreadyCounted),
        Some(d) if d == yesterday => (streak.saturating_add(1), StreakChange::Extended),
        _ => (1, StreakChange::Restarted),
    }
}

/// Result of folding `gained` XP into `(level, xp)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub level: u32,
    pub xp: u32,
    pub levels_gained: u32,
}

/// Adds `gained` and rolls over thresholds until `xp < xp_threshold(level)`.
///
/// A single award that crosses one threshold subtracts exactly that
/// threshold; larger awards keep rolling rather than leaving `xp` past
/// the new threshold.
pub fn accrue(level: u32, xp: u32, gained: u32) -> Accrual {
    let mut level = level.max(1);
    let mut xp = xp.saturating_add(gained);
    let mut levels_gained = 0;
    while xp >= xp_threshold(level) {
        xp -= xp_threshold(level);
        level += 1;
        levels_gained += 1;
    }
    Accrual {
        level,
        xp,
        levels_gained,
    }
}
