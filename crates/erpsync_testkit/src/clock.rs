//! A clock tests can move by hand.

use chrono::{DateTime, Duration, TimeZone, Utc};
use erpsync_core::{Clock, Timestamp};
use parking_lot::Mutex;

/// A [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Starts at the given time.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at 2024-01-15 09:00:00 UTC.
    pub fn new() -> Self {
        Self::starting_at(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
                .single()
                .expect("valid start time"),
        )
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Moves the clock forward by whole seconds.
    pub fn tick(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    /// Jumps to a point in time.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
