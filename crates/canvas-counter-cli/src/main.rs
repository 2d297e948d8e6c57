use clap::{Parser, Subcommand};
use canvas_counter_core::Config;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "canvas-counter", version, about = "Canvas Counter CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background timer with a live terminal view
    Run {
        /// Print view updates as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Session length and notification settings
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Course review schedule
    Course {
        #[command(subcommand)]
        action: commands::course::CourseAction,
    },
    /// Streak, level, XP and achievements
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a page visit (only Canvas pages count)
    Visit {
        url: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load();
    let filter = config
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| "info".to_string());
    logging::init(&filter);
    let config = config.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config unavailable, using defaults");
        Config::default()
    });

    let result = match cli.command {
        Commands::Run { json } => commands::run::run(&config, json),
        Commands::Timer { action } => commands::timer::run(&config, action),
        Commands::Settings { action } => commands::settings::run(&config, action),
        Commands::Course { action } => commands::course::run(&config, action),
        Commands::Stats { json } => commands::stats::run(&config, json),
        Commands::Visit { url } => commands::visit::run(&config, &url),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
