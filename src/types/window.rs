//! Date arithmetic used to split a requested range into fixed-width windows.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default width of one acquisition window, in days.
pub const WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("End date {end} precedes start date {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Window width must be at least one day")]
    ZeroWidth,
}

/// A half-open span of dates `[start, end)` requested from the export in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

/// Keys transient per-window state: one station within one window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub station: String,
    pub window_start: NaiveDate,
}

impl WindowKey {
    pub fn new(station: &str, window_start: NaiveDate) -> Self {
        Self {
            station: station.to_string(),
            window_start,
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.station, self.window_start.format("%Y-%m-%d"))
    }
}

/// Computes day counts and window boundaries for a validated date range.
///
/// Construction fails when `end` precedes `start` or the width is zero, so
/// every method on a `TimeWindower` is infallible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindower {
    start: NaiveDate,
    end: NaiveDate,
    window_days: u32,
}

impl TimeWindower {
    pub fn new(start: NaiveDate, end: NaiveDate, window_days: u32) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::InvalidRange { start, end });
        }
        if window_days == 0 {
            return Err(WindowError::ZeroWidth);
        }
        Ok(Self {
            start,
            end,
            window_days,
        })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whole days between start and end.
    pub fn day_difference(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Number of windows covering the range; never less than one.
    pub fn window_count(&self) -> usize {
        let days = self.day_difference() as u64;
        let width = u64::from(self.window_days);
        (days.div_ceil(width) as usize).max(1)
    }

    /// The windows covering the range, in chronological order.
    ///
    /// Every window is `window_days` wide except the last, which is clipped to
    /// the range end. A zero-length range yields a single one-day window.
    pub fn windows(&self) -> impl Iterator<Item = DateWindow> + '_ {
        let width = Duration::days(i64::from(self.window_days));
        let range_end = if self.end == self.start {
            self.start + Duration::days(1)
        } else {
            self.end
        };
        (0..self.window_count()).map(move |i| {
            let start = self.start + width * i as i32;
            DateWindow {
                start,
                end: (start + width).min(range_end),
            }
        })
    }
}

/// Whole days between `start` and `end`.
pub fn day_difference(start: NaiveDate, end: NaiveDate) -> Result<i64, WindowError> {
    TimeWindower::new(start, end, WINDOW_DAYS).map(|w| w.day_difference())
}

/// `ceil(days / 7)` windows, at least one.
pub fn window_count(start: NaiveDate, end: NaiveDate) -> Result<usize, WindowError> {
    TimeWindower::new(start, end, WINDOW_DAYS).map(|w| w.window_count())
}
