use chrono::{Local, TimeZone};
use clap::Subcommand;
use canvas_counter_core::reviews::{check_due_reviews, DEFAULT_INTERVAL_DAYS};
use canvas_counter_core::{Clock, Config, CourseEntry, CourseList, Notifier, Settings, SystemClock};
use std::sync::Arc;

use super::{open_store, print_json, CliResult, TerminalSink};

#[derive(Subcommand)]
pub enum CourseAction {
    /// Add a course to the review schedule
    Add {
        /// Course name
        name: String,
        /// Days between reviews
        #[arg(long, default_value_t = DEFAULT_INTERVAL_DAYS)]
        interval: u32,
    },
    /// List courses, soonest review first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a course reviewed now
    Review {
        id: i64,
    },
    /// Remove a course
    Remove {
        id: i64,
    },
    /// Send a reminder for courses that are due
    Check,
}

pub fn run(config: &Config, action: CourseAction) -> CliResult {
    let store = open_store(config)?;
    let now = SystemClock.now_ms();
    let mut courses = CourseList::load(&*store);

    match action {
        CourseAction::Add { name, interval } => {
            let added = courses.add(&name, interval, now)?.clone();
            courses.save(&*store)?;
            println!("Course added: {} (id {})", added.name, added.id);
            println!("  Next review: {}", format_ms(added.next_review));
        }
        CourseAction::List { json } => {
            let sorted = courses.sorted_by_due();
            if json {
                print_json(&sorted)?;
            } else if sorted.is_empty() {
                println!("No courses.");
            } else {
                for course in sorted {
                    print_course(course, now);
                }
            }
        }
        CourseAction::Review { id } => {
            let reviewed = courses.review(id, now)?.clone();
            courses.save(&*store)?;
            println!("Reviewed: {}", reviewed.name);
            println!("  Next review: {}", format_ms(reviewed.next_review));
        }
        CourseAction::Remove { id } => {
            let removed = courses.remove(id)?;
            courses.save(&*store)?;
            println!("Removed: {}", removed.name);
        }
        CourseAction::Check => {
            let settings = Settings::load(&*store);
            let notifier = Notifier::new(Arc::new(TerminalSink), settings.notifications_enabled);
            let reminded = check_due_reviews(&*store, &notifier, now);
            if reminded.is_empty() {
                println!("Nothing due.");
            }
        }
    }
    Ok(())
}

fn print_course(course: &CourseEntry, now: i64) {
    let marker = if course.is_due(now) { "DUE" } else { "   " };
    println!(
        "{marker} {:<14} {:<30} every {}d, next {}",
        course.id,
        course.name,
        course.interval,
        format_ms(course.next_review)
    );
}

fn format_ms(ms: i64) -> String {
    match Local.timestamp_millis_opt(ms).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M").to_string(),
        None => ms.to_string(),
    }
}
