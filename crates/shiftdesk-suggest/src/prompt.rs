//! Natural-language problem description sent to the text generator.

use chrono::Weekday;
use shiftdesk_core::types::{AvailabilityTemplate, Slot, weekday_key};
use std::fmt::Write;

use crate::candidates::{Candidate, CandidatePool};
use crate::draft::{Strategy, SuggestConstraints};

const RESPONSE_FORMAT: &str = r#"Respond with JSON only, in exactly this shape:
{"suggestions": [{"employeeId": "<id from the employee list>", "startTime": "YYYY-MM-DDTHH:MM", "endTime": "YYYY-MM-DDTHH:MM", "position": "<optional>", "reason": "<short justification>"}], "summary": "<one paragraph>"}"#;

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn strategy_text(strategy: &Strategy) -> &str {
    match strategy {
        Strategy::Balanced => {
            "Balance hours evenly across employees, respect declared availability, \
             and prefer employees with less recent load."
        }
        Strategy::Custom(text) => text,
    }
}

/// Contiguous runs of covered hours as `(start, end)`, end exclusive.
fn hour_runs(template: &AvailabilityTemplate, day: Weekday) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for hour in (0..24).filter(|h| template.covers_hour(day, *h)) {
        match runs.last_mut() {
            Some(run) if run.1 == hour => run.1 = hour + 1,
            _ => runs.push((hour, hour + 1)),
        }
    }
    runs
}

/// Compact availability, e.g. "monday 09-11, 18-20; tuesday 09-12".
fn availability_summary(template: &AvailabilityTemplate) -> String {
    if template.is_unrestricted() {
        return "any time".to_string();
    }
    let days: Vec<String> = WEEKDAYS
        .iter()
        .filter_map(|day| {
            let runs = hour_runs(template, *day);
            if runs.is_empty() {
                return None;
            }
            let ranges: Vec<String> = runs
                .iter()
                .map(|(start, end)| format!("{start:02}-{end:02}"))
                .collect();
            Some(format!("{} {}", weekday_key(*day), ranges.join(", ")))
        })
        .collect();
    if days.is_empty() {
        "none declared".to_string()
    } else {
        days.join("; ")
    }
}

fn write_header(out: &mut String, pool: &CandidatePool, constraints: &SuggestConstraints) {
    let s = &pool.schedule;
    let _ = writeln!(
        out,
        "Schedule \"{}\" for the week {} to {}.",
        s.name, s.week_start, s.week_end()
    );
    let _ = writeln!(out, "\nHard constraints:");
    let _ = writeln!(out, "- Never book an employee on two overlapping shifts.");
    let _ = writeln!(
        out,
        "- At least {} employee(s) per shift.",
        constraints.min_headcount_per_shift
    );
    let _ = writeln!(
        out,
        "- At most {:.1} hours per employee for the week.",
        constraints.max_weekly_hours
    );
    let _ = writeln!(out, "- Only use employee ids from the list below.");
}

fn write_slot(out: &mut String, slot: &Slot, assigned: &[&str]) {
    let _ = writeln!(
        out,
        "- {} {} {} | position: {} | needs {} | assigned: {}",
        slot.id,
        slot.interval.date(),
        slot.interval.time_range_label(),
        slot.position.as_deref().unwrap_or("any"),
        slot.counts.required,
        if assigned.is_empty() {
            "nobody".to_string()
        } else {
            assigned.join(", ")
        }
    );
}

fn write_employee(out: &mut String, c: &Candidate) {
    let last = c
        .last_assigned_end
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(
        out,
        "- {} ({}) | role: {} | contract {:.1}h/week | availability: {} | this week {:.1}h | recent {:.1}h | last shift ended {}",
        c.employee.id,
        c.employee.display_name,
        c.employee.role.as_deref().unwrap_or("-"),
        c.employee.default_weekly_hours,
        availability_summary(&c.employee.availability),
        c.week_hours,
        c.recent_hours,
        last
    );
}

/// Prompt for a full-week draft. Only employees without leave this week are listed.
pub fn build_week_prompt(
    pool: &CandidatePool,
    strategy: &Strategy,
    constraints: &SuggestConstraints,
) -> String {
    let mut out = String::new();
    write_header(&mut out, pool, constraints);

    let _ = writeln!(out, "\nStrategy: {}", strategy_text(strategy));
    if let Some(extra) = &constraints.instructions {
        let _ = writeln!(out, "Additional instructions: {extra}");
    }

    let _ = writeln!(out, "\nShifts:");
    if pool.slots.is_empty() {
        let _ = writeln!(
            out,
            "- none yet; propose shifts between {:02}:00 and {:02}:00",
            pool.schedule.settings.visible_start_hour, pool.schedule.settings.visible_end_hour
        );
    }
    for s in &pool.slots {
        let assigned: Vec<&str> = s.assignments.iter().map(|a| a.employee_id.as_str()).collect();
        write_slot(&mut out, &s.slot, &assigned);
    }

    let _ = writeln!(out, "\nEmployees:");
    for c in pool.eligible() {
        write_employee(&mut out, c);
    }

    let _ = writeln!(out, "\n{RESPONSE_FORMAT}");
    out
}

/// Prompt for a single slot, listing only the employees who could take it.
pub fn build_slot_prompt(pool: &CandidatePool, slot: &Slot, eligible: &[&Candidate]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Pick the single best employee for one open shift in schedule \"{}\".",
        pool.schedule.name
    );
    let _ = writeln!(out, "\nShift:");
    write_slot(&mut out, slot, &[]);
    let _ = writeln!(out, "\nEmployees who are free and not on leave:");
    for c in eligible {
        write_employee(&mut out, c);
    }
    let _ = writeln!(
        out,
        "\nReturn exactly one suggestion using the shift's start and end times.\n{RESPONSE_FORMAT}"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_availability_summary() {
        assert_eq!(availability_summary(&AvailabilityTemplate::default()), "any time");
        let mut days = BTreeMap::new();
        days.insert(
            "monday".to_string(),
            (9..17).map(|h| format!("{h:02}:00")).collect(),
        );
        days.insert("friday".to_string(), vec!["10:00".to_string()]);
        assert_eq!(
            availability_summary(&AvailabilityTemplate(days)),
            "monday 09-17; friday 10-11"
        );
    }

    #[test]
    fn test_availability_summary_keeps_gaps() {
        let mut days = BTreeMap::new();
        days.insert(
            "monday".to_string(),
            ["09:00", "10:00", "18:00", "19:00"].iter().map(|s| s.to_string()).collect(),
        );
        days.insert(
            "tuesday".to_string(),
            ["08:00", "12:00"].iter().map(|s| s.to_string()).collect(),
        );
        assert_eq!(
            availability_summary(&AvailabilityTemplate(days)),
            "monday 09-11, 18-20; tuesday 08-09, 12-13"
        );
    }

    #[test]
    fn test_strategy_text() {
        assert!(strategy_text(&Strategy::Balanced).contains("Balance hours"));
        assert_eq!(
            strategy_text(&Strategy::Custom("cover the bar first".into())),
            "cover the bar first"
        );
    }
}
