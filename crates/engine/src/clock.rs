//! Wall-clock source for the scheduler.
//!
//! Delays go through tokio timers (which tests can pause); calendar decisions
//! such as the digest gate read the time from a [`Clock`] so tests can set it.

use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    /// Current instant, used to timestamp observations.
    fn now(&self) -> DateTime<Utc>;

    /// Current local date and time, used for search dates and the digest gate.
    fn local_now(&self) -> NaiveDateTime;
}

/// The host's clock and timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests. Local time is treated as UTC.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(local: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(local),
        }
    }

    pub fn set(&self, local: NaiveDateTime) {
        if let Ok(mut now) = self.now.lock() {
            *now = local;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.local_now().and_utc()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now
            .lock()
            .map(|n| *n)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}
