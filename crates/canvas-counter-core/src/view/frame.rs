//! What a view shows, derived from a snapshot and gamification state.

use serde::Serialize;

use crate::gamification::{AchievementId, GamificationState};
use crate::timer::{SessionKind, Snapshot};

/// Everything needed to draw one frame of the view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewFrame {
    pub session: SessionKind,
    pub label: &'static str,
    pub countdown: String,
    /// 0.0 at session start, 1.0 at the end.
    pub progress: f64,
    pub is_running: bool,
    pub button: &'static str,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    pub xp_text: String,
    pub streak: u32,
    pub last_session: String,
    pub achievements: Vec<AchievementId>,
}

impl ViewFrame {
    pub fn build(snapshot: &Snapshot, progress: &GamificationState) -> Self {
        let session = snapshot.session();
        let xp_to_next_level = progress.xp_to_next_level();
        Self {
            session,
            label: session.label(),
            countdown: format_countdown(snapshot.time_left),
            progress: session_progress(snapshot),
            is_running: snapshot.is_running,
            button: if snapshot.is_running { "PAUSE" } else { "START" },
            level: progress.level,
            xp: progress.xp,
            xp_to_next_level,
            xp_text: format!("{}/{} XP", progress.xp, xp_to_next_level),
            streak: progress.streak,
            last_session: match progress.last_session_date {
                Some(date) => format!("Last session: {}", date.format("%Y-%m-%d")),
                None => "Complete a pomodoro to start!".to_string(),
            },
            achievements: progress.achievements.unlocked(),
        }
    }
}

/// `MM:SS`, minutes not capped at 59.
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Fraction of the current session already elapsed, clamped to `0..=1`.
pub fn session_progress(snapshot: &Snapshot) -> f64 {
    let total = snapshot.total_secs();
    if total == 0 {
        return 0.0;
    }
    let elapsed = total.saturating_sub(snapshot.time_left);
    (f64::from(elapsed) / f64::from(total)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(25 * 60), "25:00");
        assert_eq!(format_countdown(61), "01:01");
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(100 * 60 + 5), "100:05");
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let mut snap = Snapshot::default();
        assert_eq!(session_progress(&snap), 0.0);
        snap.time_left = 25 * 60 / 2;
        assert!((session_progress(&snap) - 0.5).abs() < 1e-9);
        // Countdown longer than the configured session (settings changed elsewhere).
        snap.time_left = 99 * 60;
        assert_eq!(session_progress(&snap), 0.0);
    }

    #[test]
    fn frame_labels_follow_state() {
        let mut snap = Snapshot::default();
        snap.is_running = true;
        snap.is_work_session = false;
        snap.time_left = 4 * 60;
        let mut g = GamificationState::default();
        g.xp = 20;
        g.last_session_date = NaiveDate::from_ymd_opt(2026, 10, 14);

        let frame = ViewFrame::build(&snap, &g);
        assert_eq!(frame.label, "Break Time");
        assert_eq!(frame.button, "PAUSE");
        assert_eq!(frame.countdown, "04:00");
        assert_eq!(frame.xp_text, "20/50 XP");
        assert_eq!(frame.last_session, "Last session: 2026-10-14");
        assert!((frame.progress - 0.2).abs() < 1e-9);
    }
}
