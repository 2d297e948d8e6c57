use clap::Subcommand;
use canvas_counter_core::protocol::{dispatch, dispatch_json};
use canvas_counter_core::{Config, Request, Response};

use super::{load_engine, lock_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print the current timer snapshot as JSON
    Status,
    /// Start or pause the countdown
    ///
    /// The countdown only advances while `canvas-counter run` is active; a
    /// timer started here picks up when it next starts. Refused while `run`
    /// holds the engine.
    Toggle,
    /// Back to the start of the current session, paused
    Reset,
    /// Send a raw JSON message, e.g. '{"action":"getTimerState"}'
    Send {
        message: String,
    },
}

pub fn run(config: &Config, action: TimerAction) -> CliResult {
    let _lock = match action {
        TimerAction::Status => None,
        _ => Some(lock_engine()?),
    };
    let mut engine = load_engine(config)?;

    let (response, events) = match action {
        TimerAction::Status => dispatch(&mut engine, Request::GetTimerState),
        TimerAction::Toggle => dispatch(&mut engine, Request::ToggleTimer),
        TimerAction::Reset => dispatch(&mut engine, Request::ResetTimer),
        TimerAction::Send { message } => {
            let value: serde_json::Value = serde_json::from_str(&message)?;
            dispatch_json(&mut engine, value)
        }
    };

    print_json(&response)?;
    for event in &events {
        print_json(event)?;
    }
    if let Response::Error { error } = response {
        return Err(error.into());
    }
    if engine.is_running() {
        eprintln!("note: the countdown advances while `canvas-counter run` is active");
    }
    Ok(())
}
