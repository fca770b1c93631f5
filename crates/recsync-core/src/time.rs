//! Date ranges and the windows used to query them.
//!
//! Recording list endpoints cap the span a single query may cover, so a
//! requested [`DateRange`] is split into consecutive [`DateWindow`]s by
//! [`DateRange::windows`]. Both types use half-open `[start, end)` semantics.

use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when building ranges or windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The range start lies after its end.
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start.
        start: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    /// A window size of zero days can never make progress.
    #[error("window size must be at least one day")]
    InvalidWindow,
}

/// A half-open range of calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Creates a new range.
    ///
    /// `start == end` is a valid, empty range. `start > end` is rejected
    /// instead of silently producing nothing.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// First day of the range (inclusive).
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Day after the last day of the range (exclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Returns true if the range covers no days.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of days covered.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Splits the range into windows of at most `window_days` days.
    ///
    /// The returned iterator is lazy and can be cloned to restart from the
    /// current cursor.
    pub fn windows(&self, window_days: u32) -> Result<Windows, TimeError> {
        if window_days == 0 {
            return Err(TimeError::InvalidWindow);
        }
        Ok(Windows {
            cursor: self.start,
            end: self.end,
            size: Duration::days(i64::from(window_days)),
        })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One bounded sub-range of a [`DateRange`], also half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day of the window (inclusive).
    pub start: NaiveDate,
    /// Day after the last day of the window (exclusive).
    pub end: NaiveDate,
}

impl DateWindow {
    /// Number of days covered by the window.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// The last day covered by the window.
    ///
    /// Providers that take an inclusive `to` date must be given this value,
    /// not `end`, or adjacent windows would both return the boundary day.
    /// Returns `None` for an empty window.
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.start >= self.end {
            return None;
        }
        self.end.pred_opt()
    }

    /// Returns true if the given day falls inside the window.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Iterator over the windows of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: NaiveDate,
    end: NaiveDate,
    size: Duration,
}

impl Iterator for Windows {
    type Item = DateWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let start = self.cursor;
        let end = start
            .checked_add_signed(self.size)
            .map_or(self.end, |candidate| candidate.min(self.end));
        self.cursor = end;
        Some(DateWindow { start, end })
    }
}

impl std::iter::FusedIterator for Windows {}
