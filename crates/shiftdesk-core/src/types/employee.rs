use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tenant boundary. Managed outside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
}

/// A worker record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub org_id: String,
    /// Linked account used as the notification address.
    #[serde(default)]
    pub user_id: Option<String>,
    pub display_name: String,
    /// Role/position tag, e.g. "cashier".
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub default_weekly_hours: f64,
    #[serde(default)]
    pub availability: AvailabilityTemplate,
    #[serde(default = "bool_true")]
    pub active: bool,
}

fn bool_true() -> bool {
    true
}

/// Lowercase English weekday name used as the availability key.
pub fn weekday_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Weekday name → hour labels ("09:00", "10:00", ...) the employee can work.
///
/// An empty template means no declared restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilityTemplate(pub BTreeMap<String, Vec<String>>);

impl AvailabilityTemplate {
    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels declared for a weekday. Key match is case-insensitive.
    pub fn labels_for(&self, day: Weekday) -> &[String] {
        let key = weekday_key(day);
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `hour` appears among the day's labels ("9:00" and "09:00" both match 9).
    pub fn covers_hour(&self, day: Weekday, hour: u32) -> bool {
        self.labels_for(day)
            .iter()
            .any(|label| label_hour(label) == Some(hour))
    }
}

/// Hour of a whole-hour label. "09:30" names no whole hour and yields `None`.
fn label_hour(label: &str) -> Option<u32> {
    let (hour, minutes) = label.trim().split_once(':')?;
    if minutes != "00" {
        return None;
    }
    hour.parse().ok().filter(|h| *h < 24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveKind {
    Vacation,
    Sick,
    Personal,
    Other,
}

impl LeaveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveKind::Vacation => "vacation",
            LeaveKind::Sick => "sick",
            LeaveKind::Personal => "personal",
            LeaveKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "vacation" => LeaveKind::Vacation,
            "sick" => LeaveKind::Sick,
            "personal" => LeaveKind::Personal,
            _ => LeaveKind::Other,
        }
    }
}

/// A leave period; both dates inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveInterval {
    pub employee_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub kind: LeaveKind,
    #[serde(default)]
    pub note: Option<String>,
}

impl LeaveInterval {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Intersects the inclusive range `[from, to]`.
    pub fn overlaps_range(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start_date <= to && self.end_date >= from
    }
}

/// Named set of employees; a UI filter, not an engine constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeGroup {
    pub id: String,
    pub org_id: String,
    pub name: String,
    #[serde(default)]
    pub employee_ids: Vec<String>,
}
