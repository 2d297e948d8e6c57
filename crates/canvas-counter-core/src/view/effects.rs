//! Timed visual effects owned by a view: the break breathing cycle and
//! the level-up animation.
//!
//! Every effect runs on a child of the view's cancellation token, so
//! cancelling the view stops them all. [`Effects::shutdown`] also waits for
//! them, which is what guarantees nothing fires after teardown.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::ViewUpdate;

/// Breathing cycle: in for 6 s, hold for 4 s, out for 4 s.
pub const BREATH_CYCLE: [(BreathPhase, Duration); 3] = [
    (BreathPhase::In, Duration::from_secs(6)),
    (BreathPhase::Hold, Duration::from_secs(4)),
    (BreathPhase::Out, Duration::from_secs(4)),
];

pub const LEVEL_UP_ANIMATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BreathPhase {
    In,
    Hold,
    Out,
}

impl BreathPhase {
    pub fn text(&self) -> &'static str {
        match self {
            BreathPhase::In => "Breathe In",
            BreathPhase::Hold => "Hold",
            BreathPhase::Out => "Breathe Out",
        }
    }
}

struct Effect {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Effect {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "view effect ended abnormally");
        }
    }
}

pub(crate) struct Effects {
    root: CancellationToken,
    updates: UnboundedSender<ViewUpdate>,
    breathing: Option<Effect>,
    level_ups: Vec<Effect>,
}

impl Effects {
    pub(crate) fn new(root: CancellationToken, updates: UnboundedSender<ViewUpdate>) -> Self {
        Self {
            root,
            updates,
            breathing: None,
            level_ups: Vec::new(),
        }
    }

    pub(crate) fn is_breathing(&self) -> bool {
        self.breathing.is_some()
    }

    /// Start the breathing cycle unless it is already going.
    pub(crate) fn start_breathing(&mut self) {
        if self.breathing.is_some() || self.root.is_cancelled() {
            return;
        }
        let cancel = self.root.child_token();
        let handle = tokio::spawn(breathe(self.updates.clone(), cancel.clone()));
        self.breathing = Some(Effect { cancel, handle });
    }

    pub(crate) async fn stop_breathing(&mut self) {
        if let Some(effect) = self.breathing.take() {
            effect.stop().await;
            let _ = self.updates.send(ViewUpdate::BreathingStopped);
        }
    }

    /// Announce a level-up now and settle the animation a second later.
    pub(crate) fn play_level_up(&mut self, level: u32) {
        self.level_ups.retain(|e| !e.handle.is_finished());
        if self.root.is_cancelled() {
            return;
        }
        let _ = self.updates.send(ViewUpdate::LevelUp { level });
        let cancel = self.root.child_token();
        let handle = tokio::spawn(settle_level_up(self.updates.clone(), cancel.clone()));
        self.level_ups.push(Effect { cancel, handle });
    }

    /// Cancel every pending effect and wait for all of them.
    pub(crate) async fn shutdown(&mut self) {
        if let Some(effect) = self.breathing.take() {
            effect.stop().await;
        }
        for effect in self.level_ups.drain(..) {
            effect.stop().await;
        }
    }
}

async fn breathe(updates: UnboundedSender<ViewUpdate>, cancel: CancellationToken) {
    loop {
        for (phase, hold_for) in BREATH_CYCLE {
            // A phase boundary can coincide with cancellation.
            if cancel.is_cancelled() || updates.send(ViewUpdate::Breath(phase)).is_err() {
                return;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = sleep(hold_for) => {}
            }
        }
    }
}

async fn settle_level_up(updates: UnboundedSender<ViewUpdate>, cancel: CancellationToken) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = sleep(LEVEL_UP_ANIMATION) => {
            let _ = updates.send(ViewUpdate::LevelUpSettled);
        }
    }
}
