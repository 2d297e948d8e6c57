//! Course review list and the due-reminder check.
//!
//! Plain persisted list operations. The only thing the background context
//! does with it on its own is [`check_due_reviews`], on a timer.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, ValidationError};
use crate::notify::Notifier;
use crate::storage::{keys, read_or_default, Partition, PersistentStore, StoreExt};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_INTERVAL_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEntry {
    /// Creation time in epoch ms.
    pub id: i64,
    pub name: String,
    /// Days between reviews.
    pub interval: u32,
    pub last_review: i64,
    pub next_review: i64,
    /// When a reminder last fired for this course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_notification: Option<i64>,
}

impl CourseEntry {
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_review <= now_ms
    }

    /// Due, and not reminded about within the last day.
    pub fn needs_reminder(&self, now_ms: i64) -> bool {
        self.is_due(now_ms) && now_ms - self.last_notification.unwrap_or(0) > DAY_MS
    }

    fn schedule_from(&mut self, now_ms: i64) {
        self.last_review = now_ms;
        self.next_review = now_ms + i64::from(self.interval) * DAY_MS;
    }
}

/// The persisted `courses` list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseList {
    courses: Vec<CourseEntry>,
}

impl CourseList {
    /// Empty when absent or malformed.
    pub fn load(store: &dyn PersistentStore) -> Self {
        read_or_default(store, Partition::Local, keys::COURSES)
    }

    pub fn save(&self, store: &dyn PersistentStore) -> Result<(), StoreError> {
        store.write(Partition::Local, keys::COURSES, self)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&CourseEntry> {
        self.courses.iter().find(|c| c.id == id)
    }

    /// Add a course due `interval_days` from now.
    ///
    /// Ids are creation timestamps, bumped forward when two courses are
    /// added within the same millisecond.
    pub fn add(
        &mut self,
        name: &str,
        interval_days: u32,
        now_ms: i64,
    ) -> Result<&CourseEntry, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        if interval_days == 0 {
            return Err(ValidationError::InvalidValue {
                field: "interval".into(),
                message: "must be at least one day".into(),
            });
        }

        let mut id = now_ms;
        while self.get(id).is_some() {
            id += 1;
        }

        let mut entry = CourseEntry {
            id,
            name: name.to_string(),
            interval: interval_days,
            last_review: now_ms,
            next_review: now_ms,
            last_notification: None,
        };
        entry.schedule_from(now_ms);
        self.courses.push(entry);
        Ok(&self.courses[self.courses.len() - 1])
    }

    pub fn remove(&mut self, id: i64) -> Result<CourseEntry, ValidationError> {
        let idx = self
            .courses
            .iter()
            .position(|c| c.id == id)
            .ok_or(ValidationError::UnknownCourse(id))?;
        Ok(self.courses.remove(idx))
    }

    /// Mark reviewed now; the next review moves to `now + interval`.
    pub fn review(&mut self, id: i64, now_ms: i64) -> Result<&CourseEntry, ValidationError> {
        let course = self
            .courses
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ValidationError::UnknownCourse(id))?;
        course.schedule_from(now_ms);
        Ok(course)
    }

    /// Soonest-due first.
    pub fn sorted_by_due(&self) -> Vec<&CourseEntry> {
        let mut sorted: Vec<&CourseEntry> = self.courses.iter().collect();
        sorted.sort_by_key(|c| c.next_review);
        sorted
    }

    pub fn due(&self, now_ms: i64) -> Vec<&CourseEntry> {
        self.courses.iter().filter(|c| c.is_due(now_ms)).collect()
    }
}

/// "2 courses are due for review: A, B".
pub fn reminder_message(names: &[&str]) -> String {
    let n = names.len();
    let (noun, verb) = if n > 1 {
        ("courses", "are")
    } else {
        ("course", "is")
    };
    format!("{n} {noun} {verb} due for review: {}", names.join(", "))
}

/// Fire one reminder for every due course not reminded in the last day.
///
/// Does nothing when notifications are off. Reminded courses get
/// `lastNotification = now` so the next hourly check skips them.
/// Returns the names included in the reminder.
pub fn check_due_reviews(
    store: &dyn PersistentStore,
    notifier: &Notifier,
    now_ms: i64,
) -> Vec<String> {
    if !notifier.is_enabled() {
        return Vec::new();
    }

    let mut list = CourseList::load(store);
    let mut reminded = Vec::new();
    for course in list.courses.iter_mut() {
        if course.needs_reminder(now_ms) {
            course.last_notification = Some(now_ms);
            reminded.push(course.name.clone());
        }
    }
    if reminded.is_empty() {
        return reminded;
    }

    if let Err(e) = list.save(store) {
        tracing::warn!(error = %e, "failed to stamp course reminders");
    }

    let names: Vec<&str> = reminded.iter().map(String::as_str).collect();
    tracing::info!(count = reminded.len(), "course reviews due");
    notifier.send("Course Review Reminder", reminder_message(&names));
    reminded
}
