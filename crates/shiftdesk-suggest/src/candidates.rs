//! The employee pool a suggestion run works from.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use shiftdesk_core::config::RulesConfig;
use shiftdesk_core::error::Result;
use shiftdesk_core::traits::AvailabilityProvider;
use shiftdesk_core::types::{Employee, Interval, LeaveInterval, Schedule, SlotWithAssignments};
use shiftdesk_store::ShiftDb;
use std::collections::HashMap;

/// An active employee annotated with leave and load.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub employee: Employee,
    /// Leave intersecting the schedule's week.
    pub leaves: Vec<LeaveInterval>,
    /// Hours already assigned in this schedule.
    pub week_hours: f64,
    /// Hours worked in the look-back window before the week.
    pub recent_hours: f64,
    /// End of the latest shift before the week started.
    pub last_assigned_end: Option<NaiveDateTime>,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.employee.id
    }

    pub fn on_leave(&self, date: NaiveDate) -> bool {
        self.leaves.iter().any(|l| l.covers(date))
    }

    /// Anyone with leave this week is kept out of generator prompts.
    pub fn has_leave_in_week(&self) -> bool {
        !self.leaves.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct CandidatePool {
    pub schedule: Schedule,
    pub slots: Vec<SlotWithAssignments>,
    /// Ordered by employee id.
    pub candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub fn load(db: &ShiftDb, org_id: &str, schedule_id: &str, rules: &RulesConfig) -> Result<Self> {
        let schedule = db.get_schedule(org_id, schedule_id)?;
        let slots = db.slots_with_assignments(org_id, schedule_id)?;

        let mut employees = db.list_employees(org_id, true)?;
        if let Some(groups) = schedule.settings.group_ids.as_ref().filter(|g| !g.is_empty()) {
            let members = db.group_member_ids(org_id, groups)?;
            employees.retain(|e| members.contains(&e.id));
        }

        let week_from = schedule.week_start;
        let week_to = schedule.week_end();
        let week_start_at = week_from.and_hms_opt(0, 0, 0).unwrap_or_default();
        let recent = db.hours_in_range(
            org_id,
            week_start_at - Duration::days(rules.recent_load_days.max(0)),
            week_start_at,
        )?;
        let last_ends = db.last_assigned_end(org_id, week_start_at)?;
        let week_hours = hours_by_employee(&slots);

        let mut candidates = Vec::with_capacity(employees.len());
        for employee in employees {
            let leaves = db.leaves(org_id, &employee.id, week_from, week_to)?;
            candidates.push(Candidate {
                week_hours: week_hours.get(&employee.id).copied().unwrap_or(0.0),
                recent_hours: recent.get(&employee.id).copied().unwrap_or(0.0),
                last_assigned_end: last_ends.get(&employee.id).copied(),
                leaves,
                employee,
            });
        }
        candidates.sort_by(|a, b| a.employee.id.cmp(&b.employee.id));

        tracing::debug!(
            "Candidate pool for {}: {} active, {} with leave this week",
            schedule.id,
            candidates.len(),
            candidates.iter().filter(|c| c.has_leave_in_week()).count()
        );
        Ok(Self {
            schedule,
            slots,
            candidates,
        })
    }

    pub fn get(&self, employee_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.employee.id == employee_id)
    }

    /// Candidates offered to the generator: active, no leave this week.
    pub fn eligible(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter().filter(|c| !c.has_leave_in_week())
    }

    /// Slot already holding `employee_id` during `interval`, ignoring `exclude_slot`.
    pub fn booked_overlap(
        &self,
        employee_id: &str,
        interval: &Interval,
        exclude_slot: Option<&str>,
    ) -> Option<&str> {
        self.slots
            .iter()
            .filter(|s| exclude_slot != Some(s.slot.id.as_str()))
            .filter(|s| s.slot.interval.overlaps(interval))
            .find(|s| s.assignments.iter().any(|a| a.employee_id == employee_id))
            .map(|s| s.slot.id.as_str())
    }
}

pub(crate) fn hours_by_employee(slots: &[SlotWithAssignments]) -> HashMap<String, f64> {
    let mut hours: HashMap<String, f64> = HashMap::new();
    for s in slots {
        for a in &s.assignments {
            *hours.entry(a.employee_id.clone()).or_default() += s.slot.interval.hours();
        }
    }
    hours
}
