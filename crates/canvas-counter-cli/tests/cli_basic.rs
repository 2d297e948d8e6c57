//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data
//! directory.

use serde_json::Value;
use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;

struct Cli {
    home: TempDir,
}

impl Cli {
    fn new() -> Self {
        Self {
            home: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Run a command and return (exit code, stdout, stderr).
    fn run(&self, args: &[&str]) -> (i32, String, String) {
        let output = Command::new(env!("CARGO_BIN_EXE_canvas-counter"))
            .args(args)
            .env("CANVAS_COUNTER_HOME", self.home.path())
            .env("CANVAS_COUNTER_LOG", "warn")
            .output()
            .expect("failed to execute canvas-counter");
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }

    /// Start `canvas-counter run` in the background with stdin piped.
    fn spawn_run(&self) -> Child {
        Command::new(env!("CARGO_BIN_EXE_canvas-counter"))
            .arg("run")
            .env("CANVAS_COUNTER_HOME", self.home.path())
            .env("CANVAS_COUNTER_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn canvas-counter run")
    }

    fn ok(&self, args: &[&str]) -> String {
        let (code, stdout, stderr) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        stdout
    }

    fn json(&self, args: &[&str]) -> Vec<Value> {
        let stdout = self.ok(args);
        serde_json::Deserializer::from_str(&stdout)
            .into_iter::<Value>()
            .collect::<Result<_, _>>()
            .expect("stdout is a JSON stream")
    }
}

#[test]
fn fresh_timer_status() {
    let cli = Cli::new();
    let out = cli.json(&["timer", "status"]);
    assert_eq!(out[0]["timeLeft"], 1500);
    assert_eq!(out[0]["isRunning"], false);
    assert_eq!(out[0]["isWorkSession"], true);
    assert_eq!(out[0]["settings"]["workDuration"], 25);
}

#[test]
fn offline_toggle_is_left_for_the_next_run() {
    let cli = Cli::new();
    let (code, stdout, stderr) = cli.run(&["timer", "toggle"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains(r#""success": true"#));
    assert!(stderr.contains("advances while `canvas-counter run` is active"));

    // Nothing ticks without `run`, so the countdown has not moved.
    let status = cli.json(&["timer", "status"]);
    assert_eq!(status[0]["isRunning"], true);
    assert_eq!(status[0]["timeLeft"], 1500);

    let (code, _, stderr) = cli.run(&["timer", "reset"]);
    assert_eq!(code, 0);
    assert!(!stderr.contains("advances while"), "{stderr}");
    let status = cli.json(&["timer", "status"]);
    assert_eq!(status[0]["isRunning"], false);
    assert_eq!(status[0]["timeLeft"], 1500);
}

#[test]
fn mutating_commands_wait_for_run_to_exit() {
    let cli = Cli::new();
    let mut child = cli.spawn_run();

    // `run` takes the engine lock shortly after start.
    let mut refused = None;
    for _ in 0..100 {
        let (code, _, stderr) = cli.run(&["timer", "reset"]);
        if code != 0 {
            refused = Some(stderr);
            break;
        }
        sleep(Duration::from_millis(100));
    }
    let stderr = refused.expect("reset was never refused while run was live");
    assert!(stderr.contains("`canvas-counter run` is active"), "{stderr}");

    let (code, _, _) = cli.run(&["settings", "set", "--work", "50"]);
    assert_ne!(code, 0);
    let (code, _, _) = cli.run(&["timer", "send", r#"{"action":"toggleTimer"}"#]);
    assert_ne!(code, 0);
    // Reads stay available.
    assert_eq!(cli.json(&["settings", "show"])[0]["workDuration"], 25);
    cli.ok(&["timer", "status"]);

    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"q\n")
        .expect("write q");
    assert!(child.wait().expect("wait for run").success());

    let settings = cli.json(&["settings", "set", "--work", "50"]);
    assert_eq!(settings[0]["workDuration"], 50);
}

#[test]
fn settings_update_resets_countdown() {
    let cli = Cli::new();
    let settings = cli.json(&["settings", "set", "--work", "50"]);
    assert_eq!(settings[0]["workDuration"], 50);
    assert_eq!(settings[0]["breakDuration"], 5);
    assert_eq!(cli.json(&["timer", "status"])[0]["timeLeft"], 3000);
}

#[test]
fn zero_duration_is_rejected() {
    let cli = Cli::new();
    let (code, _, stderr) = cli.run(&["settings", "set", "--break", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
    assert_eq!(cli.json(&["settings", "show"])[0]["breakDuration"], 5);
}

#[test]
fn unknown_action_is_an_error() {
    let cli = Cli::new();
    let (code, stdout, _) = cli.run(&["timer", "send", r#"{"action":"explode"}"#]);
    assert_ne!(code, 0);
    assert!(stdout.contains("Unknown action"));
}

#[test]
fn course_lifecycle() {
    let cli = Cli::new();
    let added = cli.ok(&["course", "add", "Organic Chemistry", "--interval", "3"]);
    assert!(added.contains("Course added: Organic Chemistry"));

    let list = cli.json(&["course", "list", "--json"]);
    let courses = list[0].as_array().expect("array");
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["interval"], 3);
    let id = courses[0]["id"].as_i64().expect("id");

    assert!(cli.ok(&["course", "review", &id.to_string()]).contains("Reviewed"));
    assert!(cli.ok(&["course", "check"]).contains("Nothing due."));
    assert!(cli.ok(&["course", "remove", &id.to_string()]).contains("Removed"));

    let (code, _, _) = cli.run(&["course", "remove", &id.to_string()]);
    assert_ne!(code, 0);
    assert!(cli.ok(&["course", "list"]).contains("No courses."));
}

#[test]
fn canvas_visits() {
    let cli = Cli::new();
    assert!(cli.ok(&["visit", "https://example.com"]).contains("not a Canvas page"));
    assert!(cli
        .ok(&["visit", "https://school.instructure.com/courses/1"])
        .contains("visit recorded"));
    assert!(cli
        .ok(&["visit", "https://school.instructure.com/courses/2"])
        .contains("already recorded today"));
    let stats = cli.json(&["stats", "--json"]);
    assert!(stats[0]["lastCanvasVisit"].is_string());
}

#[test]
fn fresh_stats() {
    let cli = Cli::new();
    let stats = cli.json(&["stats", "--json"]);
    assert_eq!(stats[0]["level"], 1);
    assert_eq!(stats[0]["xp"], 0);
    assert_eq!(stats[0]["streak"], 0);
    assert_eq!(stats[0]["xpToNextLevel"], 50);
    assert!(cli.ok(&["stats"]).contains("Complete a pomodoro to start!"));
}

#[test]
fn config_get_and_set() {
    let cli = Cli::new();
    assert_eq!(cli.ok(&["config", "get", "poll_interval_ms"]).trim(), "1000");
    cli.ok(&["config", "set", "poll_interval_ms", "500"]);
    assert_eq!(cli.ok(&["config", "get", "poll_interval_ms"]).trim(), "500");

    let (code, _, _) = cli.run(&["config", "set", "poll_interval_ms", "soon"]);
    assert_ne!(code, 0);
    let (code, _, _) = cli.run(&["config", "get", "no_such_key"]);
    assert_ne!(code, 0);
}
