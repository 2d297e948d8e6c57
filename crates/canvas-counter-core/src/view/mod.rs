//! View synchronization.
//!
//! A view never counts down on its own. It polls the background for a
//! snapshot, keeps a shadow copy of the last one it saw, and turns changes
//! into [`ViewUpdate`]s: a fresh [`ViewFrame`] on every poll, plus one-shot
//! updates when the session kind flips or the level rises. Commands go to
//! the background and are followed by an immediate poll; the shadow is
//! only ever replaced by what the background reports.

mod effects;
mod frame;

pub use effects::{BreathPhase, BREATH_CYCLE, LEVEL_UP_ANIMATION};
pub use frame::{format_countdown, session_progress, ViewFrame};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::background::EngineClient;
use crate::error::SyncError;
use crate::gamification::GamificationState;
use crate::settings::SettingsPatch;
use crate::storage::PersistentStore;
use crate::timer::{SessionKind, Snapshot};

use effects::Effects;

/// Something the view's renderer should act on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ViewUpdate {
    Render(ViewFrame),
    /// The session kind differs from the previous poll.
    SessionChanged(SessionKind),
    Breath(BreathPhase),
    BreathingStopped,
    LevelUp { level: u32 },
    LevelUpSettled,
}

/// One view's synchronized state.
pub struct ViewSync {
    client: EngineClient,
    store: Arc<dyn PersistentStore>,
    snapshot: Snapshot,
    progress: GamificationState,
    updates: mpsc::UnboundedSender<ViewUpdate>,
    effects: Effects,
    cancel: CancellationToken,
}

impl ViewSync {
    /// Open a view.
    ///
    /// Gamification is read from the store up front so a level reached
    /// before the view opened is not announced again.
    pub fn new(
        client: EngineClient,
        store: Arc<dyn PersistentStore>,
    ) -> (Self, mpsc::UnboundedReceiver<ViewUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let progress = GamificationState::load(&*store);
        let view = Self {
            client,
            store,
            snapshot: Snapshot::default(),
            progress,
            effects: Effects::new(cancel.clone(), updates.clone()),
            updates,
            cancel,
        };
        (view, rx)
    }

    /// The last snapshot the background reported.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn progress(&self) -> &GamificationState {
        &self.progress
    }

    pub fn frame(&self) -> ViewFrame {
        ViewFrame::build(&self.snapshot, &self.progress)
    }

    pub fn is_breathing(&self) -> bool {
        self.effects.is_breathing()
    }

    /// Fetch a snapshot and render.
    ///
    /// When the background can't be reached the shadow is kept and the
    /// last-known frame is rendered again.
    pub async fn poll_once(&mut self) -> Result<(), SyncError> {
        let result = self.client.get_timer_state().await;
        match &result {
            Ok(snapshot) => {
                let previous = self.snapshot.session();
                self.snapshot = *snapshot;
                let current = self.snapshot.session();
                if current != previous {
                    self.on_session_change(current).await;
                }
                self.refresh_progress();
            }
            Err(e) => tracing::warn!(error = %e, "view sync failed; keeping last state"),
        }
        self.emit(ViewUpdate::Render(self.frame()));
        result.map(|_| ())
    }

    pub async fn toggle(&mut self) -> Result<(), SyncError> {
        let sent = self.client.toggle_timer().await;
        self.after_command("toggleTimer", sent).await
    }

    pub async fn reset(&mut self) -> Result<(), SyncError> {
        let sent = self.client.reset_timer().await;
        self.after_command("resetTimer", sent).await
    }

    pub async fn update_settings(&mut self, patch: SettingsPatch) -> Result<(), SyncError> {
        let sent = self.client.update_settings(patch).await;
        self.after_command("updateSettings", sent).await
    }

    /// Stop every effect and wait for it. Nothing is emitted afterwards.
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.effects.shutdown().await;
        tracing::debug!("view closed");
    }

    /// Drive this view on its own task, polling every `poll_interval`.
    pub fn spawn(self, poll_interval: Duration) -> ViewHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(self.run(rx, poll_interval));
        ViewHandle {
            commands,
            cancel,
            task: Some(task),
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<ViewCommand>, period: Duration) {
        let cancel = self.cancel.clone();
        let _ = self.poll_once().await;

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = commands.recv() => {
                    let _ = match command {
                        ViewCommand::Toggle => self.toggle().await,
                        ViewCommand::Reset => self.reset().await,
                        ViewCommand::UpdateSettings(patch) => self.update_settings(patch).await,
                    };
                }
                _ = ticker.tick() => {
                    let _ = self.poll_once().await;
                }
            }
        }
        self.close().await;
    }

    async fn after_command(
        &mut self,
        action: &'static str,
        sent: Result<(), SyncError>,
    ) -> Result<(), SyncError> {
        if let Err(e) = sent {
            tracing::warn!(action, error = %e, "view command failed");
            return Err(e);
        }
        self.poll_once().await
    }

    async fn on_session_change(&mut self, session: SessionKind) {
        tracing::debug!(?session, "session changed");
        self.emit(ViewUpdate::SessionChanged(session));
        match session {
            SessionKind::Break => self.effects.start_breathing(),
            SessionKind::Work => self.effects.stop_breathing().await,
        }
    }

    fn refresh_progress(&mut self) {
        let previous = self.progress.level;
        self.progress = GamificationState::load(&*self.store);
        if self.progress.level > previous {
            tracing::debug!(level = self.progress.level, "level up observed");
            self.effects.play_level_up(self.progress.level);
        }
    }

    fn emit(&self, update: ViewUpdate) {
        if self.cancel.is_cancelled() {
            return;
        }
        // A closed receiver just means nobody is watching.
        let _ = self.updates.send(update);
    }
}

impl std::fmt::Debug for ViewSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSync")
            .field("snapshot", &self.snapshot)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
enum ViewCommand {
    Toggle,
    Reset,
    UpdateSettings(SettingsPatch),
}

/// Handle to a view running on its own task.
///
/// Dropping the handle cancels the view; [`ViewHandle::close`] also waits
/// for it to finish.
#[derive(Debug)]
pub struct ViewHandle {
    commands: mpsc::UnboundedSender<ViewCommand>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ViewHandle {
    /// Returns `false` if the view is already gone.
    pub fn toggle(&self) -> bool {
        self.commands.send(ViewCommand::Toggle).is_ok()
    }

    pub fn reset(&self) -> bool {
        self.commands.send(ViewCommand::Reset).is_ok()
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> bool {
        self.commands.send(ViewCommand::UpdateSettings(patch)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "view task ended abnormally");
            }
        }
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
