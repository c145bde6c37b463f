//! Hour-granularity time units and range enumeration
//!
//! The archive is partitioned into one remote directory per UTC hour, so the
//! orchestration unit is an hour-aligned instant. [`TimeUnit::range`] yields
//! the half-open sequence `[start, end)` in ascending order.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised when parsing a time unit from user input
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeParseError {
    /// Input matched none of the accepted formats
    #[error("invalid time '{0}': expected RFC3339, YYYY-MM-DDTHH, YYYY-MM-DD HH:MM or YYYY-MM-DD")]
    Unrecognized(String),
}

/// An hour-aligned UTC instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeUnit(DateTime<Utc>);

impl TimeUnit {
    /// Truncate an instant to the start of its hour
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let naive = dt.naive_utc();
        let truncated = naive
            .date()
            .and_hms_opt(naive.hour(), 0, 0)
            .unwrap_or(naive);
        Self(Utc.from_utc_datetime(&truncated))
    }

    /// Build a unit from calendar fields, `None` if the fields are out of range
    pub fn from_ymdh(year: i32, month: u32, day: u32, hour: u32) -> Option<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let naive = date.and_hms_opt(hour, 0, 0)?;
        Some(Self(Utc.from_utc_datetime(&naive)))
    }

    /// The underlying instant
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// The following hour
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::hours(1))
    }

    /// Format the unit with a `chrono` strftime pattern
    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }

    /// Enumerate the contiguous hours in `[start, end)`
    ///
    /// Empty when `end <= start`.
    pub fn range(start: TimeUnit, end: TimeUnit) -> UnitRange {
        UnitRange {
            next: start,
            end,
        }
    }

    /// Number of units in `[start, end)`
    pub fn count_between(start: TimeUnit, end: TimeUnit) -> usize {
        if end <= start {
            return 0;
        }
        (end.0 - start.0).num_hours().max(0) as usize
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:00Z"))
    }
}

impl FromStr for TimeUnit {
    type Err = TimeParseError;

    /// Accepts RFC3339 (offset or trailing `Z`), `YYYY-MM-DDTHH`,
    /// `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM` and bare `YYYY-MM-DD`.
    /// Inputs without an offset are taken as UTC. Minutes and seconds are
    /// truncated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }

        const NAIVE_FORMATS: [&str; 5] = [
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H",
        ];
        for format in NAIVE_FORMATS {
            // `%H` alone is not a complete time for NaiveDateTime, pad minutes
            let parsed = if format == "%Y-%m-%dT%H" {
                NaiveDateTime::parse_from_str(&format!("{input}:00"), "%Y-%m-%dT%H:%M")
            } else {
                NaiveDateTime::parse_from_str(input, format)
            };
            if let Ok(naive) = parsed {
                return Ok(Self::from_datetime(Utc.from_utc_datetime(&naive)));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(Utc.from_utc_datetime(&naive)));
            }
        }

        Err(TimeParseError::Unrecognized(input.to_string()))
    }
}

/// Iterator over `[start, end)` in one-hour steps
#[derive(Debug, Clone)]
pub struct UnitRange {
    next: TimeUnit,
    end: TimeUnit,
}

impl Iterator for UnitRange {
    type Item = TimeUnit;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = current.next();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = TimeUnit::count_between(self.next, self.end);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for UnitRange {}
