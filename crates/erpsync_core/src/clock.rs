//! Time source for mapper timestamps.

use crate::types::Timestamp;
use chrono::Utc;

/// Supplies the timestamps written to mapper and tombstone rows.
///
/// Backlog ordering depends on these values, so tests inject a controllable
/// clock instead of reading the system time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
