//! Deterministic auto-fill: a greedy draft for every understaffed slot.
//!
//! Slots are visited chronologically. For each open seat the candidate with
//! the fewest hours this week wins, then the least recently scheduled, then
//! the lowest id. Seats nobody can take stay open.

use shiftdesk_core::types::{Interval, SlotWithAssignments};
use shiftdesk_engine::conflicts::availability_gaps;
use std::collections::HashMap;

use crate::candidates::{Candidate, CandidatePool};
use crate::draft::ShiftSuggestion;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoFillLimits {
    /// Weekly hour cap; an assignment that would cross it is skipped.
    pub max_weekly_hours: f64,
    /// Lower bound on each slot's target headcount.
    pub min_headcount: u32,
}

fn target_headcount(slot: &SlotWithAssignments, min_headcount: u32) -> u32 {
    let counts = &slot.slot.counts;
    let target = counts.required.max(counts.min.unwrap_or(0)).max(min_headcount);
    counts.max.map_or(target, |max| target.min(max))
}

struct Planner<'p> {
    limits: AutoFillLimits,
    booked: HashMap<&'p str, Vec<Interval>>,
    hours: HashMap<&'p str, f64>,
}

impl<'p> Planner<'p> {
    fn new(pool: &'p CandidatePool, limits: AutoFillLimits) -> Self {
        let mut booked: HashMap<&str, Vec<Interval>> = HashMap::new();
        for s in &pool.slots {
            for a in &s.assignments {
                booked
                    .entry(a.employee_id.as_str())
                    .or_default()
                    .push(s.slot.interval);
            }
        }
        let hours = pool
            .candidates
            .iter()
            .map(|c| (c.id(), c.week_hours))
            .collect();
        Self {
            limits,
            booked,
            hours,
        }
    }

    fn hours_of(&self, employee_id: &str) -> f64 {
        self.hours.get(employee_id).copied().unwrap_or(0.0)
    }

    fn can_take(&self, c: &Candidate, slot: &SlotWithAssignments) -> bool {
        let interval = &slot.slot.interval;
        if c.on_leave(interval.date()) {
            return false;
        }
        if slot.assignments.iter().any(|a| a.employee_id == c.employee.id) {
            return false;
        }
        let clashes = self
            .booked
            .get(c.id())
            .is_some_and(|taken| taken.iter().any(|t| t.overlaps(interval)));
        if clashes {
            return false;
        }
        if !availability_gaps(&c.employee.availability, interval).is_empty() {
            return false;
        }
        self.hours_of(c.id()) + interval.hours() <= self.limits.max_weekly_hours
    }

    fn book(&mut self, employee_id: &'p str, interval: Interval) {
        self.booked.entry(employee_id).or_default().push(interval);
        *self.hours.entry(employee_id).or_default() += interval.hours();
    }
}

/// Suggestions that would bring every slot up to its target headcount.
pub fn plan_auto_fill(pool: &CandidatePool, limits: AutoFillLimits) -> Vec<ShiftSuggestion> {
    let mut planner = Planner::new(pool, limits);
    let mut slots: Vec<&SlotWithAssignments> = pool.slots.iter().collect();
    slots.sort_by(|a, b| {
        a.slot
            .interval
            .start
            .cmp(&b.slot.interval.start)
            .then_with(|| a.slot.id.cmp(&b.slot.id))
    });

    let mut suggestions = Vec::new();
    for slot in slots {
        let target = target_headcount(slot, limits.min_headcount);
        let assigned = slot.assignments.len() as u32;
        if assigned >= target {
            continue;
        }

        for _ in assigned..target {
            let pick = pool
                .candidates
                .iter()
                .filter(|c| planner.can_take(c, slot))
                .min_by(|a, b| {
                    planner
                        .hours_of(a.id())
                        .total_cmp(&planner.hours_of(b.id()))
                        .then_with(|| a.last_assigned_end.cmp(&b.last_assigned_end))
                        .then_with(|| a.id().cmp(b.id()))
                });
            let Some(c) = pick else {
                tracing::debug!("Auto-fill: no candidate left for slot {}", slot.slot.id);
                break;
            };

            suggestions.push(ShiftSuggestion {
                employee_id: c.employee.id.clone(),
                start_time: slot.slot.interval.start,
                end_time: slot.slot.interval.end,
                position: slot.slot.position.clone(),
                reason: Some(format!(
                    "auto-fill: {:.1}h booked this week before this shift",
                    planner.hours_of(c.id())
                )),
            });
            planner.book(c.id(), slot.slot.interval);
        }
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use shiftdesk_core::types::{
        Assignment, AvailabilityTemplate, Employee, LeaveInterval, LeaveKind, Schedule,
        ScheduleSettings, ScheduleStatus, Slot, SlotCounts,
    };
    use std::collections::BTreeMap;

    fn candidate(id: &str, week_hours: f64) -> Candidate {
        Candidate {
            employee: Employee {
                id: id.into(),
                org_id: "org".into(),
                user_id: None,
                display_name: id.into(),
                role: None,
                default_weekly_hours: 40.0,
                availability: AvailabilityTemplate::default(),
                active: true,
            },
            leaves: Vec::new(),
            week_hours,
            recent_hours: 0.0,
            last_assigned_end: None,
        }
    }

    fn slot(id: &str, start: &str, end: &str, required: u32, taken: &[&str]) -> SlotWithAssignments {
        SlotWithAssignments {
            slot: Slot {
                id: id.into(),
                schedule_id: "s".into(),
                interval: Interval::parse(start, end).unwrap(),
                position: None,
                counts: SlotCounts {
                    required,
                    min: None,
                    max: None,
                },
                created_at: Utc::now(),
            },
            assignments: taken
                .iter()
                .enumerate()
                .map(|(i, e)| Assignment {
                    id: format!("a-{id}-{i}"),
                    slot_id: id.into(),
                    employee_id: e.to_string(),
                    slot_index: i as u32,
                    created_at: Utc::now(),
                })
                .collect(),
        }
    }

    fn pool(slots: Vec<SlotWithAssignments>, candidates: Vec<Candidate>) -> CandidatePool {
        CandidatePool {
            schedule: Schedule {
                id: "s".into(),
                org_id: "org".into(),
                week_start: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                name: "Week".into(),
                status: ScheduleStatus::Draft,
                settings: ScheduleSettings::default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            slots,
            candidates,
        }
    }

    const LIMITS: AutoFillLimits = AutoFillLimits {
        max_weekly_hours: 40.0,
        min_headcount: 1,
    };

    #[test]
    fn test_fewest_hours_first_then_id() {
        let p = pool(
            vec![slot("mon", "2024-06-03T09:00", "2024-06-03T17:00", 2, &[])],
            vec![candidate("e1", 16.0), candidate("e2", 0.0), candidate("e3", 0.0)],
        );
        let picks: Vec<String> = plan_auto_fill(&p, LIMITS)
            .into_iter()
            .map(|s| s.employee_id)
            .collect();
        assert_eq!(picks, vec!["e2".to_string(), "e3".to_string()]);
    }

    #[test]
    fn test_skips_leave_overlap_and_availability() {
        let mut on_leave = candidate("e1", 0.0);
        on_leave.leaves.push(LeaveInterval {
            employee_id: "e1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
            kind: LeaveKind::Sick,
            note: None,
        });
        let mut mornings_only = candidate("e3", 0.0);
        let mut days = BTreeMap::new();
        days.insert("tuesday".to_string(), vec!["08:00".to_string(), "09:00".to_string()]);
        mornings_only.employee.availability = AvailabilityTemplate(days);

        let p = pool(
            vec![
                slot("busy", "2024-06-04T08:00", "2024-06-04T12:00", 1, &["e2"]),
                slot("open", "2024-06-04T10:00", "2024-06-04T18:00", 1, &[]),
            ],
            vec![on_leave, candidate("e2", 4.0), mornings_only, candidate("e4", 30.0)],
        );
        let picks = plan_auto_fill(&p, LIMITS);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].employee_id, "e4");
    }

    #[test]
    fn test_overtime_cap_and_running_totals() {
        let p = pool(
            vec![
                slot("a", "2024-06-03T08:00", "2024-06-03T16:00", 1, &[]),
                slot("b", "2024-06-04T08:00", "2024-06-04T16:00", 1, &[]),
            ],
            vec![candidate("e1", 30.0), candidate("e2", 33.0)],
        );
        let picks = plan_auto_fill(&p, LIMITS);
        // e1 reaches 38h on slot a; after that nobody fits under 40h
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].employee_id, "e1");
    }

    #[test]
    fn test_full_slots_untouched() {
        let p = pool(
            vec![slot("a", "2024-06-03T08:00", "2024-06-03T16:00", 1, &["e1"])],
            vec![candidate("e2", 0.0)],
        );
        assert!(plan_auto_fill(&p, LIMITS).is_empty());
    }
}
