//! Foreground mode: the background context plus one live terminal view.
//!
//! Keys (each followed by Enter): `t` start/pause, `r` reset, `q` quit.
//! Ctrl-C also quits. When stdin closes the timer keeps running until
//! Ctrl-C. Holds the engine lock until it exits, so mutating one-shot
//! commands are refused meanwhile.

use canvas_counter_core::{
    BackgroundContext, Cadence, Config, SystemClock, ViewFrame, ViewSync, ViewUpdate,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{lock_engine, open_store, CliResult, TerminalSink};

pub fn run(config: &Config, json: bool) -> CliResult {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, json))
}

async fn serve(config: &Config, json: bool) -> CliResult {
    let lock = lock_engine()?;
    let store = open_store(config)?;
    let background = BackgroundContext::start(
        store,
        Arc::new(TerminalSink),
        Arc::new(SystemClock),
        Cadence::from(config),
    );
    let (view, mut updates) = ViewSync::new(background.client(), background.store());
    let view = view.spawn(config.poll_interval());
    tracing::info!("canvas counter running");
    if !json {
        println!("t + Enter: start/pause   r: reset   q: quit");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(update) = updates.recv() => render(&update, json)?,
            line = lines.next_line(), if stdin_open => match line? {
                None => stdin_open = false,
                Some(line) => match line.trim() {
                    "t" => { view.toggle(); }
                    "r" => { view.reset(); }
                    "q" => break,
                    "" => {}
                    other => eprintln!("unknown key: {other}"),
                },
            },
        }
    }

    view.close().await;
    background.shutdown().await;
    drop(lock);
    tracing::info!("canvas counter stopped");
    Ok(())
}

fn render(update: &ViewUpdate, json: bool) -> CliResult {
    if json {
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }
    match update {
        ViewUpdate::Render(frame) => println!("{}", status_line(frame)),
        ViewUpdate::SessionChanged(session) => println!("── {} ──", session.label()),
        ViewUpdate::Breath(phase) => println!("   ~ {} ~", phase.text()),
        ViewUpdate::BreathingStopped => {}
        ViewUpdate::LevelUp { level } => println!("★ Level {level}!"),
        ViewUpdate::LevelUpSettled => {}
    }
    Ok(())
}

fn status_line(frame: &ViewFrame) -> String {
    let filled = (frame.progress * 20.0).round() as usize;
    format!(
        "[{}{}] {} {}  {:<5} | Lv {} {} | 🔥 {}",
        "#".repeat(filled),
        "-".repeat(20 - filled.min(20)),
        frame.label,
        frame.countdown,
        frame.button,
        frame.level,
        frame.xp_text,
        frame.streak,
    )
}
