use canvas_counter_core::visits::{is_canvas_url, record_visit};
use canvas_counter_core::{Clock, Config, SystemClock};

use super::{open_store, CliResult};

pub fn run(config: &Config, url: &str) -> CliResult {
    if !is_canvas_url(url) {
        println!("not a Canvas page");
        return Ok(());
    }
    let store = open_store(config)?;
    if record_visit(&*store, url, SystemClock.today()) {
        println!("visit recorded");
    } else {
        println!("already recorded today");
    }
    Ok(())
}
