//! Logging initialization.
//!
//! `CANVAS_COUNTER_LOG` takes precedence over the configured `log_filter`.
//! Output goes to stderr so stdout stays clean for command output.

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "CANVAS_COUNTER_LOG";

pub fn init(fallback: &str) {
    fmt()
        .with_env_filter(filter(fallback))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
