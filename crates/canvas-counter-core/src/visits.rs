//! Canvas LMS visit tracking.

use chrono::NaiveDate;

use crate::storage::{keys, write_logged, Partition, PersistentStore, StoreExt};

/// Hosts and substrings that identify a Canvas page.
const CANVAS_MARKERS: [&str; 2] = ["instructure.com", "canvas"];

pub fn is_canvas_url(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    CANVAS_MARKERS.iter().any(|marker| url.contains(marker))
}

/// Record that a Canvas page was visited today.
///
/// Non-Canvas URLs are ignored. The store is only written when the day
/// changes. Returns `true` when a new day was recorded.
pub fn record_visit(store: &dyn PersistentStore, url: &str, today: NaiveDate) -> bool {
    if !is_canvas_url(url) {
        return false;
    }
    let last = store
        .read::<NaiveDate>(Partition::Local, keys::LAST_CANVAS_VISIT)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable lastCanvasVisit");
            None
        });
    if last == Some(today) {
        return false;
    }
    write_logged(store, Partition::Local, keys::LAST_CANVAS_VISIT, &today);
    tracing::info!(%today, "canvas visit recorded");
    true
}

/// Last recorded Canvas visit, if any.
pub fn last_visit(store: &dyn PersistentStore) -> Option<NaiveDate> {
    store
        .read(Partition::Local, keys::LAST_CANVAS_VISIT)
        .ok()
        .flatten()
}
