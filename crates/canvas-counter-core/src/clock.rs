//! Time source for calendar-day and timestamp decisions.

use chrono::{Duration, Local, NaiveDate};
use std::sync::Mutex;

/// Supplies "today" in user-local time and the current epoch milliseconds.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now_ms(&self) -> i64;

    fn yesterday(&self) -> NaiveDate {
        self.today() - Duration::days(1)
    }
}

/// Wall clock in the user's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_ms(&self) -> i64 {
        Local::now().timestamp_millis()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    inner: Mutex<(NaiveDate, i64)>,
}

impl FixedClock {
    pub fn new(today: NaiveDate, now_ms: i64) -> Self {
        Self {
            inner: Mutex::new((today, now_ms)),
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.0 = today;
        }
    }

    pub fn advance_days(&self, days: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.0 += Duration::days(days);
            inner.1 += days * 24 * 60 * 60 * 1000;
        }
    }

    pub fn set_now_ms(&self, now_ms: i64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.1 = now_ms;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.inner
            .lock()
            .map(|inner| inner.0)
            .unwrap_or(NaiveDate::MIN)
    }

    fn now_ms(&self) -> i64 {
        self.inner.lock().map(|inner| inner.1).unwrap_or_default()
    }
}
