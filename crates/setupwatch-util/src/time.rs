//! Time utilities for setupwatch
//!
//! Cycle timing uses monotonic time so that wall-clock changes cannot
//! distort the measured duration of a poll cycle. Wall-clock time is only
//! used to stamp snapshots for display.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// Get the current local wall-clock time.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a DateTime for display with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Represents a point in monotonic time for measuring cycle duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}
