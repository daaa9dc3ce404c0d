use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShiftdeskError};

/// Canonical storage format for wall-clock timestamps.
///
/// Fixed width, so lexicographic order equals chronological order.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ACCEPTED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a local wall-clock timestamp in any of the accepted layouts.
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| ShiftdeskError::validation(format!("unparsable timestamp '{s}'")))
}

/// A half-open `[start, end)` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    /// Build an interval, rejecting empty or inverted windows.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(ShiftdeskError::validation(format!(
                "interval start {} must be before end {}",
                start.format(DATETIME_FORMAT),
                end.format(DATETIME_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_datetime(start)?, parse_datetime(end)?)
    }

    /// `self.start < other.end && self.end > other.start`.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 3600.0
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// "09:00-17:00"
    pub fn time_range_label(&self) -> String {
        format!("{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }

    /// Start hour of every whole-hour increment the interval spans.
    ///
    /// 09:00–17:00 yields 9..=16; 09:30–11:00 yields 9 and 10.
    pub fn hour_steps(&self) -> Vec<u32> {
        let mut hours = Vec::new();
        let mut t = self.start;
        while t < self.end {
            hours.push(t.hour());
            t += Duration::hours(1);
        }
        hours
    }

    pub fn start_key(&self) -> String {
        self.start.format(DATETIME_FORMAT).to_string()
    }

    pub fn end_key(&self) -> String {
        self.end.format(DATETIME_FORMAT).to_string()
    }
}
