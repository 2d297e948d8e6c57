use clap::Subcommand;
use canvas_counter_core::protocol::dispatch;
use canvas_counter_core::{Config, Request, Response, SettingsPatch};

use super::{load_engine, lock_engine, print_json, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print current settings as JSON
    Show,
    /// Change one or more settings; refused while `canvas-counter run` is active
    Set {
        /// Work session length in minutes
        #[arg(long)]
        work: Option<u32>,
        /// Break length in minutes
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        /// Enable or disable notifications
        #[arg(long)]
        notifications: Option<bool>,
    },
}

pub fn run(config: &Config, action: SettingsAction) -> CliResult {
    let _lock = match action {
        SettingsAction::Show => None,
        SettingsAction::Set { .. } => Some(lock_engine()?),
    };
    let mut engine = load_engine(config)?;
    match action {
        SettingsAction::Show => print_json(engine.settings()),
        SettingsAction::Set {
            work,
            break_minutes,
            notifications,
        } => {
            let settings = SettingsPatch {
                work_duration: work,
                break_duration: break_minutes,
                notifications_enabled: notifications,
            };
            let (response, _) = dispatch(&mut engine, Request::UpdateSettings { settings });
            if let Response::Error { error } = response {
                return Err(error.into());
            }
            print_json(engine.settings())
        }
    }
}
