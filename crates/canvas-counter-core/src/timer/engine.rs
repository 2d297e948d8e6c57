//! Session engine.
//!
//! The single authoritative countdown. Like the rest of the core it has no
//! internal thread: the background context calls `tick()` once per second
//! while the engine reports `is_running()`.
//!
//! ## State Transitions
//!
//! ```text
//! WorkIdle  <-> WorkRunning
//!    ^              | time_left hits 0 (streak, XP, achievements)
//!    |              v
//! BreakRunning <-> BreakIdle
//!    | time_left hits 0
//!    v
//! WorkIdle
//! ```
//!
//! Every mutation is persisted to the local partition before the call
//! returns. Persistence failures are logged, never surfaced.

use chrono::Utc;
use std::sync::Arc;

use super::{SessionKind, Snapshot, TimerState};
use crate::clock::Clock;
use crate::error::ValidationError;
use crate::events::Event;
use crate::gamification::{GamificationLedger, GamificationState};
use crate::notify::{NotificationSink, Notifier};
use crate::settings::{Settings, SettingsPatch};
use crate::storage::{keys, write_logged, Partition, PersistentStore};

pub struct SessionEngine {
    store: Arc<dyn PersistentStore>,
    notifier: Notifier,
    settings: Settings,
    timer: TimerState,
    ledger: GamificationLedger,
}

impl SessionEngine {
    /// Build the engine from whatever is persisted.
    ///
    /// A timer that was running at its last save comes back running, with
    /// the saved `time_left`: wall-clock time spent while no background
    /// context existed is not counted.
    pub fn load(
        store: Arc<dyn PersistentStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = Settings::load(&*store);
        let timer = TimerState::load(&*store, &settings);
        let ledger = GamificationLedger::load(store.clone(), clock);

        if timer.is_running {
            tracing::info!(
                time_left = timer.time_left,
                session = ?timer.session(),
                "resuming countdown from persisted state"
            );
        }

        Self {
            store,
            notifier: Notifier::new(sink, settings.notifications_enabled),
            settings,
            timer,
            ledger,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            time_left: self.timer.time_left,
            is_running: self.timer.is_running,
            is_work_session: self.timer.is_work_session,
            settings: self.settings,
        }
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running
    }

    pub fn session(&self) -> SessionKind {
        self.timer.session()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gamification(&self) -> &GamificationState {
        self.ledger.state()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// No-op when already running.
    pub fn start(&mut self) -> Option<Event> {
        if self.timer.is_running {
            return None;
        }
        self.timer.is_running = true;
        self.persist_timer();
        tracing::info!(time_left = self.timer.time_left, session = ?self.session(), "timer started");
        Some(Event::TimerStarted {
            session: self.session(),
            time_left: self.timer.time_left,
            at: Utc::now(),
        })
    }

    /// Idempotent. Persists even when already paused; returns an event only
    /// if the timer was running.
    pub fn pause(&mut self) -> Option<Event> {
        let was_running = self.timer.is_running;
        self.timer.is_running = false;
        self.persist_timer();
        if !was_running {
            return None;
        }
        tracing::info!(time_left = self.timer.time_left, "timer paused");
        Some(Event::TimerPaused {
            session: self.session(),
            time_left: self.timer.time_left,
            at: Utc::now(),
        })
    }

    /// Pause when running, start otherwise.
    pub fn toggle(&mut self) -> Option<Event> {
        if self.timer.is_running {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Pause and rewind the current session to its full length.
    pub fn reset(&mut self) -> Event {
        self.timer.is_running = false;
        self.timer.time_left = self.settings.duration_secs(self.timer.is_work_session);
        self.persist_timer();
        tracing::info!(time_left = self.timer.time_left, session = ?self.session(), "timer reset");
        Event::TimerReset {
            session: self.session(),
            time_left: self.timer.time_left,
            at: Utc::now(),
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Does nothing unless running. Returns the completion events when this
    /// tick took `time_left` to zero.
    pub fn tick(&mut self) -> Vec<Event> {
        if !self.timer.is_running {
            return Vec::new();
        }
        self.timer.time_left = self.timer.time_left.saturating_sub(1);
        self.persist_timer();
        tracing::debug!(time_left = self.timer.time_left, "tick");

        if self.timer.time_left == 0 {
            return self.complete_session();
        }
        Vec::new()
    }

    /// Finish the current session and switch to the other kind, idle.
    ///
    /// A finished work session first goes through the gamification ledger.
    pub fn complete_session(&mut self) -> Vec<Event> {
        self.timer.is_running = false;
        let finished = self.session();
        let mut events = Vec::new();

        match finished {
            SessionKind::Work => {
                let level_before = self.ledger.state().level;
                let reward = self.ledger.reward_work_session(&self.notifier);
                let now = Utc::now();

                events.push(Event::StreakUpdated {
                    streak: reward.streak,
                    at: now,
                });
                events.push(Event::XpAwarded {
                    gained: reward.award.gained(),
                    streak_bonus: reward.award.streak_bonus,
                    level: reward.award.level,
                    xp: reward.award.xp,
                    at: now,
                });
                if reward.award.level > level_before {
                    events.push(Event::LevelUp {
                        level: reward.award.level,
                        at: now,
                    });
                }
                if !reward.unlocked.is_empty() {
                    events.push(Event::AchievementsUnlocked {
                        achievements: reward.unlocked,
                        at: now,
                    });
                }

                self.notifier.send(
                    "Focus session complete!",
                    format!(
                        "Great work! Time for a {}-minute break.",
                        self.settings.break_duration
                    ),
                );
            }
            SessionKind::Break => {
                self.notifier.send(
                    "Break is over!",
                    format!(
                        "Ready for another {}-minute focus session?",
                        self.settings.work_duration
                    ),
                );
            }
        }

        let next = finished.next();
        self.timer.is_work_session = next.is_work();
        self.timer.time_left = self.settings.duration_secs(next.is_work());
        self.persist_timer();
        tracing::info!(?finished, ?next, time_left = self.timer.time_left, "session completed");

        events.insert(
            0,
            Event::SessionCompleted {
                finished,
                next,
                next_time_left: self.timer.time_left,
                at: Utc::now(),
            },
        );
        events
    }

    /// Merge, persist to the synced partition, then reset.
    ///
    /// The in-progress countdown is discarded even when durations did not
    /// change.
    ///
    /// # Errors
    /// Rejects zero durations without touching any state.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<Vec<Event>, ValidationError> {
        let merged = self.settings.merged(patch)?;
        self.settings = merged;
        self.notifier.set_enabled(merged.notifications_enabled);
        write_logged(&*self.store, Partition::Synced, keys::SETTINGS, &self.settings);
        tracing::info!(?merged, "settings updated");

        Ok(vec![
            Event::SettingsUpdated {
                settings: merged,
                at: Utc::now(),
            },
            self.reset(),
        ])
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn persist_timer(&self) {
        write_logged(&*self.store, Partition::Local, keys::TIMER_STATE, &self.timer);
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("settings", &self.settings)
            .field("timer", &self.timer)
            .field("gamification", self.ledger.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::StoreError;
    use crate::gamification::AchievementId;
    use crate::notify::MemorySink;
    use crate::storage::{MemoryStore, StoreExt};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    struct Harness {
        store: Arc<MemoryStore>,
        sink: Arc<MemorySink>,
        clock: Arc<FixedClock>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryStore::new()),
                sink: Arc::new(MemorySink::new()),
                clock: Arc::new(FixedClock::new(
                    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
                    1_760_000_000_000,
                )),
            }
        }

        fn engine(&self) -> SessionEngine {
            SessionEngine::load(self.store.clone(), self.sink.clone(), self.clock.clone())
        }

        fn persisted_timer(&self) -> TimerState {
            self.store
                .read(Partition::Local, keys::TIMER_STATE)
                .unwrap()
                .unwrap()
        }

        fn seed_timer(&self, time_left: u32, is_running: bool, is_work_session: bool) {
            self.store
                .write(
                    Partition::Local,
                    keys::TIMER_STATE,
                    &TimerState {
                        time_left,
                        is_running,
                        is_work_session,
                    },
                )
                .unwrap();
        }
    }

    #[test]
    fn zero_stored_duration_does_not_complete_on_first_tick() {
        let h = Harness::new();
        h.store
            .write(
                Partition::Synced,
                keys::SETTINGS,
                &serde_json::json!({"workDuration": 0, "breakDuration": 5, "notificationsEnabled": true}),
            )
            .unwrap();
        let mut engine = h.engine();
        assert_eq!(engine.timer().time_left, 25 * 60);

        engine.start();
        assert!(engine.tick().is_empty());
        assert_eq!(engine.timer().time_left, 25 * 60 - 1);
        assert!(engine.timer().is_work_session);
        assert_eq!(engine.gamification().xp, 0);
    }

    #[test]
    fn initial_state_is_work_idle() {
        let h = Harness::new();
        let engine = h.engine();
        assert_eq!(
            engine.timer(),
            TimerState {
                time_left: 25 * 60,
                is_running: false,
                is_work_session: true
            }
        );
    }

    #[test]
    fn start_is_noop_when_running() {
        let h = Harness::new();
        let mut engine = h.engine();
        assert!(engine.start().is_some());
        assert!(engine.start().is_none());
        assert!(h.persisted_timer().is_running);
    }

    #[test]
    fn pause_is_idempotent() {
        let h = Harness::new();
        let mut engine = h.engine();
        engine.start();
        assert!(engine.pause().is_some());
        assert!(engine.pause().is_none());
        assert!(!engine.is_running());
        assert!(!h.persisted_timer().is_running);
    }

    #[test]
    fn toggle_alternates() {
        let h = Harness::new();
        let mut engine = h.engine();
        engine.toggle();
        assert!(engine.is_running());
        engine.toggle();
        assert!(!engine.is_running());
    }

    #[test]
    fn tick_is_ignored_while_paused() {
        let h = Harness::new();
        let mut engine = h.engine();
        assert!(engine.tick().is_empty());
        assert_eq!(engine.timer().time_left, 25 * 60);
    }

    #[test]
    fn tick_persists_every_second() {
        let h = Harness::new();
        let mut engine = h.engine();
        engine.start();
        engine.tick();
        engine.tick();
        assert_eq!(h.persisted_timer().time_left, 25 * 60 - 2);
    }

    #[test]
    fn reset_restores_current_session_length() {
        let h = Harness::new();
        h.seed_timer(17, true, false);
        let mut engine = h.engine();
        engine.reset();
        assert_eq!(
            engine.timer(),
            TimerState {
                time_left: 5 * 60,
                is_running: false,
                is_work_session: false
            }
        );
        assert_eq!(h.persisted_timer(), engine.timer());
    }

    #[test]
    fn completing_work_session_rewards_and_switches_to_break() {
        let h = Harness::new();
        h.seed_timer(1, true, true);
        let mut engine = h.engine();
        assert!(engine.is_running());

        let events = engine.tick();
        assert!(matches!(
            events.first(),
            Some(Event::SessionCompleted {
                finished: SessionKind::Work,
                next: SessionKind::Break,
                ..
            })
        ));

        assert_eq!(
            engine.timer(),
            TimerState {
                time_left: 5 * 60,
                is_running: false,
                is_work_session: false
            }
        );
        assert_eq!(h.persisted_timer(), engine.timer());

        let g = GamificationState::load(&*h.store);
        assert_eq!(g.streak, 1);
        assert_eq!(g.xp, 25);
        assert_eq!(g.level, 1);
        assert!(g.achievements.is_unlocked(AchievementId::FirstSession));

        let titles = h.sink.titles();
        assert!(titles.contains(&"🏆 Achievement Unlocked!".to_string()));
        assert!(titles.contains(&"Focus session complete!".to_string()));
        assert!(!titles.contains(&"🔥 Streak Bonus!".to_string()));
    }

    #[test]
    fn completing_break_returns_to_work_without_rewards() {
        let h = Harness::new();
        h.seed_timer(1, true, false);
        let mut engine = h.engine();
        engine.tick();

        assert_eq!(
            engine.timer(),
            TimerState {
                time_left: 25 * 60,
                is_running: false,
                is_work_session: true
            }
        );
        assert_eq!(GamificationState::load(&*h.store), GamificationState::default());
        assert_eq!(h.sink.titles(), vec!["Break is over!".to_string()]);
    }

    #[test]
    fn update_settings_pauses_and_rederives_countdown() {
        let h = Harness::new();
        let mut engine = h.engine();
        engine.start();
        engine.tick();

        let events = engine
            .update_settings(&SettingsPatch {
                work_duration: Some(50),
                ..SettingsPatch::default()
            })
            .unwrap();
        assert_eq!(events.len(), 2);
        assert!(!engine.is_running());
        assert_eq!(engine.timer().time_left, 50 * 60);
        assert_eq!(Settings::load(&*h.store).work_duration, 50);
        assert_eq!(h.persisted_timer().time_left, 50 * 60);
    }

    #[test]
    fn invalid_settings_leave_timer_running() {
        let h = Harness::new();
        let mut engine = h.engine();
        engine.start();
        let result = engine.update_settings(&SettingsPatch {
            work_duration: Some(0),
            ..SettingsPatch::default()
        });
        assert!(result.is_err());
        assert!(engine.is_running());
        assert_eq!(engine.settings().work_duration, 25);
    }

    #[test]
    fn disabled_notifications_are_dropped() {
        let h = Harness::new();
        h.seed_timer(1, true, true);
        let mut engine = h.engine();
        engine
            .update_settings(&SettingsPatch {
                notifications_enabled: Some(false),
                ..SettingsPatch::default()
            })
            .unwrap();
        engine.start();
        for _ in 0..25 * 60 {
            engine.tick();
        }
        assert!(!engine.session().is_work());
        assert!(h.sink.received().is_empty());
    }

    #[test]
    fn restart_resumes_from_persisted_time_left() {
        let h = Harness::new();
        {
            let mut engine = h.engine();
            engine.start();
            for _ in 0..10 {
                engine.tick();
            }
        }
        let engine = h.engine();
        assert!(engine.is_running());
        assert_eq!(engine.timer().time_left, 25 * 60 - 10);
    }

    struct FailingStore;

    impl PersistentStore for FailingStore {
        fn get(&self, _: Partition, _: &[&str]) -> Result<Map<String, Value>, StoreError> {
            Err(StoreError::Locked)
        }

        fn set(&self, _: Partition, _: Map<String, Value>) -> Result<(), StoreError> {
            Err(StoreError::Locked)
        }
    }

    #[test]
    fn store_failures_do_not_stop_the_engine() {
        let h = Harness::new();
        let mut engine =
            SessionEngine::load(Arc::new(FailingStore), h.sink.clone(), h.clock.clone());
        engine.start();
        engine.tick();
        assert_eq!(engine.timer().time_left, 25 * 60 - 1);
        assert_eq!(engine.settings(), &Settings::default());
    }

    proptest! {
        #[test]
        fn countdown_never_increases_and_completes_once(start in 1u32..200, ticks in 0usize..400) {
            let h = Harness::new();
            h.seed_timer(start, true, true);
            let mut engine = h.engine();

            let mut prev = engine.timer().time_left;
            let mut completions = 0;
            for _ in 0..ticks {
                if !engine.is_running() {
                    break;
                }
                let events = engine.tick();
                completions += events
                    .iter()
                    .filter(|e| matches!(e, Event::SessionCompleted { .. }))
                    .count();
                if completions == 0 {
                    prop_assert!(engine.timer().time_left < prev);
                    prev = engine.timer().time_left;
                }
            }

            let expected = if ticks as u32 >= start { 1 } else { 0 };
            prop_assert_eq!(completions, expected);
        }
    }
}
