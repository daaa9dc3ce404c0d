//! Advisory conflict flags over persisted shifts.
//!
//! Nothing here blocks a write. Reports are recomputed from the rows passed in
//! on every call; there is no cache to invalidate.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use shiftdesk_core::config::RulesConfig;
use shiftdesk_core::types::{
    AvailabilityTemplate, Employee, Interval, SlotWithAssignments, weekday_key,
};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyHours {
    pub employee_id: String,
    pub employee_name: String,
    pub hours: f64,
    pub overtime: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityConflict {
    pub slot_id: String,
    pub assignment_id: String,
    pub employee_id: String,
    pub employee_name: String,
    /// Weekday key looked up in the template, e.g. "monday".
    pub day: String,
    /// Hours the shift spans that the template does not list.
    pub missing_hours: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum StaffingIssue {
    BelowRequired { required: u32 },
    BelowMin { min: u32 },
    AboveMax { max: u32 },
}

/// Headcount outside the slot's bounds. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingWarning {
    pub slot_id: String,
    pub date: NaiveDate,
    pub time_range: String,
    pub assigned: u32,
    #[serde(flatten)]
    pub issue: StaffingIssue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Per employee, ordered by id.
    pub weekly_hours: Vec<WeeklyHours>,
    pub availability: Vec<AvailabilityConflict>,
    pub staffing: Vec<StaffingWarning>,
}

impl ConflictReport {
    pub fn is_overtime(&self, employee_id: &str) -> bool {
        self.weekly_hours
            .iter()
            .any(|w| w.employee_id == employee_id && w.overtime)
    }

    pub fn overtime_employees(&self) -> Vec<&str> {
        self.weekly_hours
            .iter()
            .filter(|w| w.overtime)
            .map(|w| w.employee_id.as_str())
            .collect()
    }

    pub fn has_availability_conflict(&self, assignment_id: &str) -> bool {
        self.availability
            .iter()
            .any(|c| c.assignment_id == assignment_id)
    }
}

pub struct ConflictAnalyzer {
    overtime_threshold_hours: f64,
}

impl Default for ConflictAnalyzer {
    fn default() -> Self {
        Self::new(&RulesConfig::default())
    }
}

impl ConflictAnalyzer {
    pub fn new(rules: &RulesConfig) -> Self {
        Self {
            overtime_threshold_hours: rules.overtime_threshold_hours,
        }
    }

    /// Flag overtime, availability gaps and staffing issues across `slots`.
    ///
    /// `employees` maps id → record; assignments whose employee is missing from
    /// it still count toward hours but are never availability-flagged.
    pub fn analyze(
        &self,
        slots: &[SlotWithAssignments],
        employees: &HashMap<String, Employee>,
    ) -> ConflictReport {
        let mut hours: BTreeMap<&str, f64> = BTreeMap::new();
        let mut availability = Vec::new();

        for s in slots {
            for a in &s.assignments {
                *hours.entry(a.employee_id.as_str()).or_default() += s.slot.interval.hours();

                let Some(employee) = employees.get(&a.employee_id) else {
                    continue;
                };
                let missing = availability_gaps(&employee.availability, &s.slot.interval);
                if !missing.is_empty() {
                    availability.push(AvailabilityConflict {
                        slot_id: s.slot.id.clone(),
                        assignment_id: a.id.clone(),
                        employee_id: a.employee_id.clone(),
                        employee_name: employee.display_name.clone(),
                        day: weekday_key(s.slot.interval.start.weekday()).to_string(),
                        missing_hours: missing,
                    });
                }
            }
        }

        let weekly_hours = hours
            .into_iter()
            .map(|(id, h)| WeeklyHours {
                employee_id: id.to_string(),
                employee_name: employees
                    .get(id)
                    .map(|e| e.display_name.clone())
                    .unwrap_or_else(|| id.to_string()),
                hours: h,
                overtime: h > self.overtime_threshold_hours,
            })
            .collect();

        let report = ConflictReport {
            weekly_hours,
            availability,
            staffing: staffing_warnings(slots),
        };
        tracing::debug!(
            "Conflict analysis: {} overtime, {} availability, {} staffing",
            report.overtime_employees().len(),
            report.availability.len(),
            report.staffing.len()
        );
        report
    }
}

/// Hours of `interval` missing from the template's entry for the start weekday.
///
/// An unrestricted (empty) template never has gaps.
pub fn availability_gaps(template: &AvailabilityTemplate, interval: &Interval) -> Vec<u32> {
    if template.is_unrestricted() {
        return Vec::new();
    }
    let day = interval.start.weekday();
    interval
        .hour_steps()
        .into_iter()
        .filter(|h| !template.covers_hour(day, *h))
        .collect()
}

/// Slots whose headcount is below `required`/`min` or above `max`.
pub fn staffing_warnings(slots: &[SlotWithAssignments]) -> Vec<StaffingWarning> {
    let mut warnings = Vec::new();
    for s in slots {
        let assigned = u32::try_from(s.assignments.len()).unwrap_or(u32::MAX);
        let counts = s.slot.counts;
        let issue = if let Some(max) = counts.max.filter(|m| assigned > *m) {
            Some(StaffingIssue::AboveMax { max })
        } else if let Some(min) = counts.min.filter(|m| assigned < *m) {
            Some(StaffingIssue::BelowMin { min })
        } else if assigned < counts.required {
            Some(StaffingIssue::BelowRequired {
                required: counts.required,
            })
        } else {
            None
        };
        if let Some(issue) = issue {
            warnings.push(StaffingWarning {
                slot_id: s.slot.id.clone(),
                date: s.slot.interval.date(),
                time_range: s.slot.interval.time_range_label(),
                assigned,
                issue,
            });
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shiftdesk_core::types::{Assignment, Slot, SlotCounts};

    fn employee(id: &str, availability: &[(&str, &[&str])]) -> Employee {
        Employee {
            id: id.into(),
            org_id: "org".into(),
            user_id: None,
            display_name: id.to_uppercase(),
            role: None,
            default_weekly_hours: 40.0,
            availability: AvailabilityTemplate(
                availability
                    .iter()
                    .map(|(d, hs)| (d.to_string(), hs.iter().map(|h| h.to_string()).collect()))
                    .collect(),
            ),
            active: true,
        }
    }

    fn slot(id: &str, start: &str, end: &str, counts: SlotCounts, who: &[&str]) -> SlotWithAssignments {
        SlotWithAssignments {
            slot: Slot {
                id: id.into(),
                schedule_id: "sch".into(),
                interval: Interval::parse(start, end).unwrap(),
                position: None,
                counts,
                created_at: Utc::now(),
            },
            assignments: who
                .iter()
                .enumerate()
                .map(|(i, e)| Assignment {
                    id: format!("{id}-{i}"),
                    slot_id: id.into(),
                    employee_id: e.to_string(),
                    slot_index: i as u32,
                    created_at: Utc::now(),
                })
                .collect(),
        }
    }

    const ONE: SlotCounts = SlotCounts {
        required: 1,
        min: None,
        max: None,
    };

    #[test]
    fn test_overtime_is_strictly_above_threshold() {
        // five 8h days = exactly 40h, not overtime
        let mut slots: Vec<_> = (3..8)
            .map(|d| {
                slot(
                    &format!("s{d}"),
                    &format!("2024-06-0{d}T09:00"),
                    &format!("2024-06-0{d}T17:00"),
                    ONE,
                    &["e1"],
                )
            })
            .collect();
        let employees: HashMap<_, _> = [("e1".to_string(), employee("e1", &[]))].into();
        let report = ConflictAnalyzer::default().analyze(&slots, &employees);
        assert_eq!(report.weekly_hours[0].hours, 40.0);
        assert!(!report.is_overtime("e1"));

        slots.push(slot("s8", "2024-06-08T09:00", "2024-06-08T10:00", ONE, &["e1"]));
        let report = ConflictAnalyzer::default().analyze(&slots, &employees);
        assert!(report.is_overtime("e1"));
        assert_eq!(report.overtime_employees(), vec!["e1"]);
    }

    #[test]
    fn test_availability_template_hours() {
        let employees: HashMap<_, _> = [
            (
                "e1".to_string(),
                employee("e1", &[("monday", &["09:00", "10:00", "11:00"])]),
            ),
            ("e2".to_string(), employee("e2", &[])),
        ]
        .into();
        let slots = vec![
            slot("ok", "2024-06-03T09:00", "2024-06-03T12:00", ONE, &["e1"]),
            slot("late", "2024-06-03T11:00", "2024-06-03T13:00", ONE, &["e1"]),
            slot("tue", "2024-06-04T09:00", "2024-06-04T10:00", ONE, &["e1"]),
            slot("free", "2024-06-04T20:00", "2024-06-04T23:00", ONE, &["e2"]),
        ];
        let report = ConflictAnalyzer::default().analyze(&slots, &employees);
        assert!(!report.has_availability_conflict("ok-0"));
        assert!(report.has_availability_conflict("late-0"));
        assert!(report.has_availability_conflict("tue-0"));
        // no template = no restriction
        assert!(!report.has_availability_conflict("free-0"));

        let late = report
            .availability
            .iter()
            .find(|c| c.slot_id == "late")
            .unwrap();
        assert_eq!(late.missing_hours, vec![12]);
        assert_eq!(late.day, "monday");
    }

    #[test]
    fn test_staffing_warnings() {
        let two = SlotCounts {
            required: 2,
            min: None,
            max: None,
        };
        let capped = SlotCounts {
            required: 1,
            min: Some(1),
            max: Some(1),
        };
        let slots = vec![
            slot("short", "2024-06-03T09:00", "2024-06-03T17:00", two, &["e1"]),
            slot("over", "2024-06-04T09:00", "2024-06-04T17:00", capped, &["e1", "e2"]),
            slot("fine", "2024-06-05T09:00", "2024-06-05T17:00", ONE, &["e1"]),
        ];
        let warnings = staffing_warnings(&slots);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].issue, StaffingIssue::BelowRequired { required: 2 });
        assert_eq!(warnings[1].issue, StaffingIssue::AboveMax { max: 1 });
    }
}
