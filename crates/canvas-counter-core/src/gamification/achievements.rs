use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Achievement identifiers, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AchievementId {
    FirstSession,
    StreakStarter,
    WeekStreak,
    StreakChampion,
    MonthMaster,
    StreakLegend,
    StreakGod,
}

/// What has to be true for an achievement to unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any completed work session.
    AnySession,
    /// Streak of at least this many days.
    Streak(u32),
}

impl AchievementId {
    pub const ALL: [AchievementId; 7] = [
        AchievementId::FirstSession,
        AchievementId::StreakStarter,
        AchievementId::WeekStreak,
        AchievementId::StreakChampion,
        AchievementId::MonthMaster,
        AchievementId::StreakLegend,
        AchievementId::StreakGod,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            AchievementId::FirstSession => "first-session",
            AchievementId::StreakStarter => "streak-starter",
            AchievementId::WeekStreak => "week-streak",
            AchievementId::StreakChampion => "streak-champion",
            AchievementId::MonthMaster => "month-master",
            AchievementId::StreakLegend => "streak-legend",
            AchievementId::StreakGod => "streak-god",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AchievementId::FirstSession => "First Focus",
            AchievementId::StreakStarter => "Streak Starter",
            AchievementId::WeekStreak => "Week Warrior",
            AchievementId::StreakChampion => "Streak Champion",
            AchievementId::MonthMaster => "Month Master",
            AchievementId::StreakLegend => "Streak Legend",
            AchievementId::StreakGod => "Streak God",
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            AchievementId::FirstSession => Requirement::AnySession,
            AchievementId::StreakStarter => Requirement::Streak(3),
            AchievementId::WeekStreak => Requirement::Streak(7),
            AchievementId::StreakChampion => Requirement::Streak(14),
            AchievementId::MonthMaster => Requirement::Streak(30),
            AchievementId::StreakLegend => Requirement::Streak(60),
            AchievementId::StreakGod => Requirement::Streak(100),
        }
    }

    /// Evaluated right after a work session completed.
    pub fn is_earned(&self, streak: u32) -> bool {
        match self.requirement() {
            Requirement::AnySession => true,
            Requirement::Streak(days) => streak >= days,
        }
    }
}

/// Persisted `{id -> bool}` map.
///
/// Unknown ids found in storage are carried along untouched. Nothing here
/// ever writes `false` over a `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Achievements(BTreeMap<String, bool>);

impl Achievements {
    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.0.get(id.key()).copied().unwrap_or(false)
    }

    /// Returns `true` if this call flipped it from locked to unlocked.
    pub fn unlock(&mut self, id: AchievementId) -> bool {
        let slot = self.0.entry(id.key().to_string()).or_insert(false);
        let newly = !*slot;
        *slot = true;
        newly
    }

    pub fn unlocked(&self) -> Vec<AchievementId> {
        AchievementId::ALL
            .into_iter()
            .filter(|id| self.is_unlocked(*id))
            .collect()
    }

    /// Newly earned achievements for `streak`, unlocking them as it goes.
    pub fn evaluate(&mut self, streak: u32) -> Vec<AchievementId> {
        AchievementId::ALL
            .into_iter()
            .filter(|id| id.is_earned(streak))
            .filter(|id| self.unlock(*id))
            .collect()
    }
}

/// "Achievement unlocked: X!" or "Achievements unlocked: X, Y!".
pub fn unlock_message(ids: &[AchievementId]) -> String {
    let names: Vec<&str> = ids.iter().map(|id| id.display_name()).collect();
    if names.len() == 1 {
        format!("Achievement unlocked: {}!", names[0])
    } else {
        format!("Achievements unlocked: {}!", names.join(", "))
    }
}
