//! Fire-and-forget user alerts.
//!
//! Sinks get `{title, message}` and nothing comes back: no acknowledgment,
//! no retry, no queue. [`Notifier`] gates a sink on the user's
//! `notificationsEnabled` setting.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Anything that can show a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Routes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: Notification) {
        tracing::info!(title = %notification.title, "{}", notification.message);
    }
}

/// Keeps every notification it receives.
#[derive(Debug, Default)]
pub struct MemorySink {
    received: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, oldest first.
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.received().into_iter().map(|n| n.title).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut r) = self.received.lock() {
            r.clear();
        }
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut r) = self.received.lock() {
            r.push(notification);
        }
    }
}

/// A sink plus the user's on/off switch.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    enabled: bool,
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, enabled: bool) -> Self {
        Self { sink, enabled }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Deliver if enabled; dropped silently otherwise.
    pub fn send(&self, title: impl Into<String>, message: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.sink.notify(Notification::new(title, message));
    }

    /// Deliver regardless of the user's setting.
    pub fn send_always(&self, title: impl Into<String>, message: impl Into<String>) {
        self.sink.notify(Notification::new(title, message));
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_notifier_drops() {
        let sink = Arc::new(MemorySink::new());
        let mut notifier = Notifier::new(sink.clone(), false);
        notifier.send("a", "b");
        assert!(sink.received().is_empty());

        notifier.set_enabled(true);
        notifier.send("a", "b");
        assert_eq!(sink.received(), vec![Notification::new("a", "b")]);
    }
}
