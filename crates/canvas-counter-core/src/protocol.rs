//! View → background message protocol.
//!
//! Requests are a closed enum; [`dispatch`] matches it exhaustively, so a
//! new command is a compile error until it is handled. [`dispatch_json`]
//! is the untyped edge: anything that does not parse as a [`Request`]
//! gets `{"error": "Unknown action"}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Event;
use crate::settings::SettingsPatch;
use crate::timer::{SessionEngine, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetTimerState,
    ToggleTimer,
    ResetTimer,
    UpdateSettings { settings: SettingsPatch },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::GetTimerState => "getTimerState",
            Request::ToggleTimer => "toggleTimer",
            Request::ResetTimer => "resetTimer",
            Request::UpdateSettings { .. } => "updateSettings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Snapshot(Snapshot),
    Success { success: bool },
    Error { error: String },
}

impl Response {
    pub fn ok() -> Self {
        Response::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    pub fn unknown_action() -> Self {
        Response::error("Unknown action")
    }
}

/// Apply one request to the engine.
///
/// Returns the response for the caller and the events the engine produced.
pub fn dispatch(engine: &mut SessionEngine, request: Request) -> (Response, Vec<Event>) {
    match request {
        Request::GetTimerState => (Response::Snapshot(engine.snapshot()), Vec::new()),
        Request::ToggleTimer => (Response::ok(), engine.toggle().into_iter().collect()),
        Request::ResetTimer => (Response::ok(), vec![engine.reset()]),
        Request::UpdateSettings { settings } => match engine.update_settings(&settings) {
            Ok(events) => (Response::ok(), events),
            Err(e) => {
                tracing::warn!(error = %e, "rejected settings update");
                (Response::error(e.to_string()), Vec::new())
            }
        },
    }
}

/// Parse a raw message and dispatch it.
pub fn dispatch_json(engine: &mut SessionEngine, message: Value) -> (Response, Vec<Event>) {
    match serde_json::from_value::<Request>(message) {
        Ok(request) => dispatch(engine, request),
        Err(e) => {
            tracing::debug!(error = %e, "unrecognized message");
            (Response::unknown_action(), Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::notify::MemorySink;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn engine() -> SessionEngine {
        SessionEngine::load(
            Arc::new(MemoryStore::new()),
            Arc::new(MemorySink::new()),
            Arc::new(SystemClock),
        )
    }

    #[test]
    fn requests_parse_from_wire_shape() {
        let r: Request = serde_json::from_value(json!({"action": "toggleTimer"})).unwrap();
        assert_eq!(r, Request::ToggleTimer);

        let r: Request = serde_json::from_value(json!({
            "action": "updateSettings",
            "settings": {"workDuration": 50, "breakDuration": 10, "notificationsEnabled": false}
        }))
        .unwrap();
        assert_eq!(
            r,
            Request::UpdateSettings {
                settings: SettingsPatch {
                    work_duration: Some(50),
                    break_duration: Some(10),
                    notifications_enabled: Some(false),
                }
            }
        );
    }

    #[test]
    fn get_timer_state_returns_snapshot_shape() {
        let mut e = engine();
        let (resp, _) = dispatch_json(&mut e, json!({"action": "getTimerState"}));
        assert_eq!(
            serde_json::to_value(resp).unwrap(),
            json!({
                "timeLeft": 1500,
                "isRunning": false,
                "isWorkSession": true,
                "settings": {"workDuration": 25, "breakDuration": 5, "notificationsEnabled": true}
            })
        );
    }

    #[test]
    fn commands_reply_success() {
        let mut e = engine();
        for action in ["toggleTimer", "resetTimer"] {
            let (resp, _) = dispatch_json(&mut e, json!({ "action": action }));
            assert_eq!(serde_json::to_value(resp).unwrap(), json!({"success": true}));
        }
    }

    #[test]
    fn unknown_action_is_reported() {
        let mut e = engine();
        for msg in [json!({"action": "launchRockets"}), json!({}), json!("toggleTimer")] {
            let (resp, events) = dispatch_json(&mut e, msg);
            assert_eq!(
                serde_json::to_value(resp).unwrap(),
                json!({"error": "Unknown action"})
            );
            assert!(events.is_empty());
        }
    }

    #[test]
    fn untagged_response_roundtrips() {
        let snap: Response = serde_json::from_value(json!({
            "timeLeft": 3, "isRunning": true, "isWorkSession": false,
            "settings": {"workDuration": 25, "breakDuration": 5, "notificationsEnabled": true}
        }))
        .unwrap();
        assert!(matches!(snap, Response::Snapshot(s) if s.time_left == 3));

        let ok: Response = serde_json::from_value(json!({"success": true})).unwrap();
        assert_eq!(ok, Response::ok());
    }

    #[test]
    fn invalid_settings_reply_error() {
        let mut e = engine();
        let (resp, events) = dispatch(
            &mut e,
            Request::UpdateSettings {
                settings: SettingsPatch {
                    work_duration: Some(0),
                    ..SettingsPatch::default()
                },
            },
        );
        assert!(matches!(resp, Response::Error { .. }));
        assert!(events.is_empty());
    }
}
