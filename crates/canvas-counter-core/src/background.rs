//! The long-lived background context.
//!
//! Owns the one [`SessionEngine`] and everything that drives it:
//!
//! - a tick driver that calls `tick()` once per period while the engine is
//!   running, and sleeps otherwise;
//! - a message loop that applies [`Request`]s one at a time, in arrival
//!   order, and replies over a oneshot channel;
//! - the course review reminder, on its own slower period.
//!
//! All three share the engine behind a `Mutex` that is held for exactly one
//! operation and never across an `.await`.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::error::SyncError;
use crate::events::Event;
use crate::notify::{NotificationSink, Notifier};
use crate::protocol::{dispatch, dispatch_json, Request, Response};
use crate::reviews::check_due_reviews;
use crate::settings::{Settings, SettingsPatch};
use crate::storage::{keys, write_logged, Config, Partition, PersistentStore, StoreExt};
use crate::timer::{SessionEngine, Snapshot};

const REQUEST_QUEUE: usize = 32;
const EVENT_CAPACITY: usize = 64;

/// Cadence of the background's periodic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub tick: Duration,
    pub review_delay: Duration,
    pub review_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for Cadence {
    fn from(config: &Config) -> Self {
        Self {
            tick: config.tick_interval(),
            review_delay: config.review_check_delay(),
            review_interval: config.review_check_interval(),
        }
    }
}

enum Message {
    Typed(Request, oneshot::Sender<Response>),
    Raw(Value, oneshot::Sender<Response>),
}

struct Shared {
    engine: Mutex<SessionEngine>,
    events: broadcast::Sender<Event>,
    /// Poked after every command so the tick driver re-checks `is_running`.
    wake: Notify,
}

impl Shared {
    fn engine(&self) -> MutexGuard<'_, SessionEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: Vec<Event>) {
        for event in events {
            tracing::debug!(?event, "engine event");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn handle(&self, message: Message) {
        let (response, events, reply) = {
            let mut engine = self.engine();
            match message {
                Message::Typed(request, reply) => {
                    let (response, events) = dispatch(&mut engine, request);
                    (response, events, reply)
                }
                Message::Raw(value, reply) => {
                    let (response, events) = dispatch_json(&mut engine, value);
                    (response, events, reply)
                }
            }
        };
        self.publish(events);
        self.wake.notify_one();
        // The requester may have given up; that's not our problem.
        let _ = reply.send(response);
    }
}

/// The running background context.
///
/// Dropping it cancels every task it spawned.
pub struct BackgroundContext {
    shared: Arc<Shared>,
    store: Arc<dyn PersistentStore>,
    requests: mpsc::Sender<Message>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl BackgroundContext {
    /// Initialize from persisted state and start the periodic work.
    ///
    /// Must be called from inside a tokio runtime. On a first run (no
    /// settings in the synced partition yet) writes the defaults and
    /// greets the user. A countdown that was running at its last save
    /// resumes immediately.
    pub fn start(
        store: Arc<dyn PersistentStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        cadence: Cadence,
    ) -> Self {
        install_if_first_run(&*store, &sink);

        let engine = SessionEngine::load(store.clone(), sink, clock.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            engine: Mutex::new(engine),
            events,
            wake: Notify::new(),
        });

        let shutdown = CancellationToken::new();
        let (requests, inbox) = mpsc::channel(REQUEST_QUEUE);

        let tasks = vec![
            tokio::spawn(run_message_loop(shared.clone(), inbox, shutdown.clone())),
            tokio::spawn(run_tick_driver(shared.clone(), cadence.tick, shutdown.clone())),
            tokio::spawn(run_review_checks(
                shared.clone(),
                store.clone(),
                clock,
                cadence,
                shutdown.clone(),
            )),
        ];

        tracing::info!(?cadence, "background context started");
        Self {
            shared,
            store,
            requests,
            shutdown,
            tasks,
        }
    }

    /// A handle views use to talk to this context.
    pub fn client(&self) -> EngineClient {
        EngineClient {
            requests: self.requests.clone(),
        }
    }

    /// Shared storage handle, for views that read gamification directly.
    pub fn store(&self) -> Arc<dyn PersistentStore> {
        self.store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.engine().snapshot()
    }

    /// Run `f` against the engine under the lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut SessionEngine) -> R) -> R {
        let result = f(&mut self.shared.engine());
        self.shared.wake.notify_one();
        result
    }

    /// Stop all periodic work and wait for it to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        tracing::info!("background context stopped");
    }
}

impl Drop for BackgroundContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn install_if_first_run(store: &dyn PersistentStore, sink: &Arc<dyn NotificationSink>) {
    match store.read::<Value>(Partition::Synced, keys::SETTINGS) {
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::info!("first run, writing default settings");
            write_logged(store, Partition::Synced, keys::SETTINGS, &Settings::default());
            Notifier::new(sink.clone(), true).send_always(
                "Canvas Counter Installed!",
                "Start your study streak by completing a pomodoro session!",
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not check for first run");
        }
    }
}

async fn run_message_loop(
    shared: Arc<Shared>,
    mut inbox: mpsc::Receiver<Message>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            message = inbox.recv() => match message {
                Some(message) => shared.handle(message),
                None => break,
            },
        }
    }
    tracing::debug!("message loop stopped");
}

async fn run_tick_driver(shared: Arc<Shared>, period: Duration, shutdown: CancellationToken) {
    loop {
        // Idle: wait for a command that might have started the timer.
        if !shared.engine().is_running() {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = shared.wake.notified() => continue,
            }
        }

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {
                    let (events, running) = {
                        let mut engine = shared.engine();
                        let events = engine.tick();
                        (events, engine.is_running())
                    };
                    shared.publish(events);
                    if !running {
                        break;
                    }
                }
                _ = shared.wake.notified() => {
                    if !shared.engine().is_running() {
                        break;
                    }
                }
            }
        }
    }
}

async fn run_review_checks(
    shared: Arc<Shared>,
    store: Arc<dyn PersistentStore>,
    clock: Arc<dyn Clock>,
    cadence: Cadence,
    shutdown: CancellationToken,
) {
    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = sleep(cadence.review_delay) => {}
    }

    let mut ticker = interval_at(Instant::now(), cadence.review_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                let notifier = shared.engine().notifier().clone();
                check_due_reviews(&*store, &notifier, clock.now_ms());
            }
        }
    }
}

/// Request/response handle to a [`BackgroundContext`].
///
/// Cheap to clone. Every call fails with [`SyncError::Unreachable`] once
/// the context is gone.
#[derive(Debug, Clone)]
pub struct EngineClient {
    requests: mpsc::Sender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Typed(request, _) => f.debug_tuple("Typed").field(request).finish(),
            Message::Raw(value, _) => f.debug_tuple("Raw").field(value).finish(),
        }
    }
}

impl EngineClient {
    pub async fn request(&self, request: Request) -> Result<Response, SyncError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Message::Typed(request, reply))
            .await
            .map_err(|_| SyncError::Unreachable)?;
        response.await.map_err(|_| SyncError::Unreachable)
    }

    /// Send an untyped message, as a foreign caller would.
    pub async fn request_json(&self, message: Value) -> Result<Response, SyncError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Message::Raw(message, reply))
            .await
            .map_err(|_| SyncError::Unreachable)?;
        response.await.map_err(|_| SyncError::Unreachable)
    }

    pub async fn get_timer_state(&self) -> Result<Snapshot, SyncError> {
        match self.request(Request::GetTimerState).await? {
            Response::Snapshot(snapshot) => Ok(snapshot),
            Response::Error { error } => Err(SyncError::Rejected(error)),
            Response::Success { .. } => Err(SyncError::UnexpectedResponse("getTimerState")),
        }
    }

    pub async fn toggle_timer(&self) -> Result<(), SyncError> {
        self.command(Request::ToggleTimer).await
    }

    pub async fn reset_timer(&self) -> Result<(), SyncError> {
        self.command(Request::ResetTimer).await
    }

    pub async fn update_settings(&self, settings: SettingsPatch) -> Result<(), SyncError> {
        self.command(Request::UpdateSettings { settings }).await
    }

    async fn command(&self, request: Request) -> Result<(), SyncError> {
        match self.request(request).await? {
            Response::Success { .. } => Ok(()),
            Response::Error { error } => Err(SyncError::Rejected(error)),
            Response::Snapshot(_) => Err(SyncError::UnexpectedResponse(request.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::gamification::GamificationState;
    use crate::notify::MemorySink;
    use crate::reviews::{CourseList, DAY_MS};
    use crate::storage::MemoryStore;
    use crate::timer::TimerState;
    use chrono::NaiveDate;
    use serde_json::json;

    const T0: i64 = 1_760_000_000_000;

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
                    T0,
                )),
            }
        }

        fn start(&self) -> BackgroundContext {
            BackgroundContext::start(
                self.store.clone(),
                self.sink.clone(),
                self.clock.clone(),
                Cadence::default(),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_writes_defaults_and_greets() {
        let h = Harness::new();
        let bg = h.start();
        assert_eq!(
            h.store.read::<Settings>(Partition::Synced, keys::SETTINGS).unwrap(),
            Some(Settings::default())
        );
        assert_eq!(h.sink.titles(), vec!["Canvas Counter Installed!".to_string()]);
        bg.shutdown().await;

        // Second start is not a first run.
        h.sink.clear();
        let bg = h.start();
        assert!(h.sink.received().is_empty());
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn toggled_timer_ticks_once_per_second() {
        let h = Harness::new();
        let bg = h.start();
        let client = bg.client();

        client.toggle_timer().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;

        let snap = client.get_timer_state().await.unwrap();
        assert!(snap.is_running);
        assert_eq!(snap.time_left, 25 * 60 - 3);

        client.toggle_timer().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let snap = client.get_timer_state().await.unwrap();
        assert!(!snap.is_running);
        assert_eq!(snap.time_left, 25 * 60 - 3);
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_toggles_never_double_tick() {
        let h = Harness::new();
        let bg = h.start();
        let client = bg.client();

        for _ in 0..5 {
            client.toggle_timer().await.unwrap();
            client.toggle_timer().await.unwrap();
        }
        client.toggle_timer().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert_eq!(client.get_timer_state().await.unwrap().time_left, 25 * 60 - 10);
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn running_state_resumes_after_restart() {
        let h = Harness::new();
        h.store
            .write(
                Partition::Local,
                keys::TIMER_STATE,
                &TimerState {
                    time_left: 2,
                    is_running: true,
                    is_work_session: true,
                },
            )
            .unwrap();
        let bg = h.start();
        let mut events = bg.subscribe();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let snap = bg.snapshot();
        assert!(!snap.is_running);
        assert!(!snap.is_work_session);
        assert_eq!(snap.time_left, 5 * 60);
        assert!(matches!(
            events.try_recv(),
            Ok(Event::SessionCompleted { .. })
        ));
        assert_eq!(GamificationState::load(&*h.store).streak, 1);
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_actions_are_answered() {
        let h = Harness::new();
        let bg = h.start();
        let response = bg
            .client()
            .request_json(json!({"action": "doSomethingElse"}))
            .await
            .unwrap();
        assert_eq!(response, Response::unknown_action());
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn settings_update_resets_running_timer() {
        let h = Harness::new();
        let bg = h.start();
        let client = bg.client();
        client.toggle_timer().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;

        client
            .update_settings(SettingsPatch {
                work_duration: Some(50),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        let snap = client.get_timer_state().await.unwrap();
        assert!(!snap.is_running);
        assert_eq!(snap.time_left, 50 * 60);
        assert_eq!(snap.settings.work_duration, 50);

        let rejected = client
            .update_settings(SettingsPatch {
                break_duration: Some(0),
                ..SettingsPatch::default()
            })
            .await;
        assert!(matches!(rejected, Err(SyncError::Rejected(_))));
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn client_sees_unreachable_after_shutdown() {
        let h = Harness::new();
        let bg = h.start();
        let client = bg.client();
        bg.shutdown().await;
        assert_eq!(client.get_timer_state().await, Err(SyncError::Unreachable));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_configured_cadence_still_runs() {
        let h = Harness::new();
        let mut config = Config::default();
        config.set("review_check_delay_min", &u64::MAX.to_string()).unwrap();
        config.set("review_check_interval_min", &u64::MAX.to_string()).unwrap();
        let bg = BackgroundContext::start(
            h.store.clone(),
            h.sink.clone(),
            h.clock.clone(),
            Cadence::from(&config),
        );
        let client = bg.client();

        client.toggle_timer().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(client.get_timer_state().await.unwrap().time_left, 1498);
        bg.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn review_reminder_runs_on_schedule() {
        let h = Harness::new();
        let mut list = CourseList::default();
        list.add("Biology", 1, T0 - 2 * DAY_MS).unwrap();
        list.save(&*h.store).unwrap();

        let bg = h.start();
        h.sink.clear();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.sink.received().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(h.sink.titles(), vec!["Course Review Reminder".to_string()]);

        // Hourly re-check within the same day stays quiet.
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(h.sink.received().len(), 1);
        bg.shutdown().await;
    }
}
