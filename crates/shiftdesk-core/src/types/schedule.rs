use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::interval::Interval;
use crate::error::{Result, ShiftdeskError};

/// Lifecycle state. One-way: DRAFT → PUBLISHED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleStatus {
    Draft,
    Published,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Draft => "DRAFT",
            ScheduleStatus::Published => "PUBLISHED",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = ShiftdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DRAFT" => Ok(ScheduleStatus::Draft),
            "PUBLISHED" => Ok(ScheduleStatus::Published),
            other => Err(ShiftdeskError::validation(format!(
                "unknown schedule status '{other}'"
            ))),
        }
    }
}

/// Per-schedule display settings and slot defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_start_hour")]
    pub visible_start_hour: u32,
    #[serde(default = "default_end_hour")]
    pub visible_end_hour: u32,
    #[serde(default = "all_days")]
    pub visible_days: Vec<Weekday>,
    /// Restrict offered workers to these groups.
    #[serde(default)]
    pub group_ids: Option<Vec<String>>,
    #[serde(default)]
    pub default_min_count: Option<u32>,
    #[serde(default)]
    pub default_max_count: Option<u32>,
    #[serde(default = "default_slot_minutes")]
    pub default_slot_minutes: u32,
}

fn default_start_hour() -> u32 { 6 }
fn default_end_hour() -> u32 { 22 }
fn default_slot_minutes() -> u32 { 480 }
fn all_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            visible_start_hour: default_start_hour(),
            visible_end_hour: default_end_hour(),
            visible_days: all_days(),
            group_ids: None,
            default_min_count: None,
            default_max_count: None,
            default_slot_minutes: default_slot_minutes(),
        }
    }
}

impl ScheduleSettings {
    pub fn validate(&self) -> Result<()> {
        if self.visible_end_hour > 24 || self.visible_start_hour >= self.visible_end_hour {
            return Err(ShiftdeskError::validation(format!(
                "visible hour range {}..{} is invalid",
                self.visible_start_hour, self.visible_end_hour
            )));
        }
        if self.default_slot_minutes == 0 {
            return Err(ShiftdeskError::validation("default slot duration must be positive"));
        }
        if let (Some(min), Some(max)) = (self.default_min_count, self.default_max_count) {
            if min > max {
                return Err(ShiftdeskError::validation(format!(
                    "default min count {min} exceeds default max count {max}"
                )));
            }
        }
        Ok(())
    }
}

/// Weekly container of slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub org_id: String,
    /// Always a Monday.
    pub week_start: NaiveDate,
    pub name: String,
    pub status: ScheduleStatus,
    pub settings: ScheduleSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Last day of the week, inclusive.
    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(6)
    }

    /// Whether `interval` starts on one of this schedule's seven days.
    pub fn covers(&self, interval: &Interval) -> bool {
        let day = interval.start.date();
        self.week_start <= day && day <= self.week_end()
    }

    /// `Validation` error unless [`Schedule::covers`] holds.
    pub fn ensure_covers(&self, interval: &Interval) -> Result<()> {
        if self.covers(interval) {
            Ok(())
        } else {
            Err(ShiftdeskError::validation(format!(
                "{} starts outside the week {} to {}",
                interval.start,
                self.week_start,
                self.week_end()
            )))
        }
    }
}

/// "Week of Jun 03 – Jun 09, 2024"
pub fn derive_schedule_name(week_start: NaiveDate) -> String {
    let end = week_start + Duration::days(6);
    format!(
        "Week of {} – {}, {}",
        week_start.format("%b %d"),
        end.format("%b %d"),
        end.year()
    )
}

/// Headcount bounds for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCounts {
    pub required: u32,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
}

impl SlotCounts {
    pub fn validate(&self) -> Result<()> {
        if self.required < 1 {
            return Err(ShiftdeskError::validation("required count must be at least 1"));
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(ShiftdeskError::validation(format!(
                    "min count {min} exceeds max count {max}"
                )));
            }
        }
        Ok(())
    }
}

/// A bookable time window inside a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub schedule_id: String,
    pub interval: Interval,
    #[serde(default)]
    pub position: Option<String>,
    pub counts: SlotCounts,
    pub created_at: DateTime<Utc>,
}

/// Input for slot creation. Missing min/max fall back to schedule defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSlot {
    pub schedule_id: String,
    pub interval: Interval,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default = "one")]
    pub required_count: u32,
    #[serde(default)]
    pub min_count: Option<u32>,
    #[serde(default)]
    pub max_count: Option<u32>,
}

fn one() -> u32 {
    1
}

/// A (slot, employee) link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub slot_id: String,
    pub employee_id: String,
    /// Ordinal among concurrent occupants of the same slot.
    pub slot_index: u32,
    pub created_at: DateTime<Utc>,
}

/// A slot with its occupants ordered by `slot_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotWithAssignments {
    pub slot: Slot,
    pub assignments: Vec<Assignment>,
}
