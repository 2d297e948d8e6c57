use canvas_counter_core::visits::last_visit;
use canvas_counter_core::{AchievementId, Config, GamificationState};
use serde::Serialize;

use super::{open_store, print_json, CliResult};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Stats {
    #[serde(flatten)]
    progress: GamificationState,
    xp_to_next_level: u32,
    last_canvas_visit: Option<chrono::NaiveDate>,
}

pub fn run(config: &Config, json: bool) -> CliResult {
    let store = open_store(config)?;
    let progress = GamificationState::load(&*store);
    let last_canvas_visit = last_visit(&*store);

    if json {
        return print_json(&Stats {
            xp_to_next_level: progress.xp_to_next_level(),
            progress,
            last_canvas_visit,
        });
    }

    println!("Level {}  ({}/{} XP)", progress.level, progress.xp, progress.xp_to_next_level());
    println!("Streak: {} day(s)", progress.streak);
    match progress.last_session_date {
        Some(date) => println!("Last session: {date}"),
        None => println!("Complete a pomodoro to start!"),
    }
    if let Some(date) = last_canvas_visit {
        println!("Last Canvas visit: {date}");
    }
    println!("Achievements:");
    for id in AchievementId::ALL {
        let mark = if progress.achievements.is_unlocked(id) { "x" } else { " " };
        println!("  [{mark}] {}", id.display_name());
    }
    Ok(())
}
