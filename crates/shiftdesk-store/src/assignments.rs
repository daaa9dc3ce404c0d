//! Assignment writes. Each method holds the write lock from the overlap check
//! through the insert, so concurrent requests for the same employee serialise
//! and exactly one of two intersecting bookings succeeds.

use rusqlite::{Connection, OptionalExtension, params};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::types::{
    Assignment, Employee, Interval, NewSlot, Schedule, Slot, SlotCounts, SlotWithAssignments,
    new_id,
};
use std::collections::HashSet;

use crate::db::{
    ASSIGNMENT_SELECT, SLOT_COLUMNS, ShiftDb, datetime_key, db_err, load_employee, load_schedule,
    load_slot, now_rfc3339, row_to_assignment, row_to_slot, slot_assignments,
};
use crate::outcome::{BulkAssignOutcome, BulkSkip, SkipReason};
use crate::schedules::{insert_slot, touch_schedule};

impl ShiftDb {
    /// Book `employee_id` onto a slot.
    ///
    /// `slot_index` defaults to the lowest free ordinal. Fails with
    /// `OverlapConflict` if the employee already holds an intersecting slot in
    /// the same schedule (the target slot included).
    pub fn assign_employee(
        &self,
        org_id: &str,
        slot_id: &str,
        employee_id: &str,
        slot_index: Option<u32>,
    ) -> Result<Assignment> {
        let assignment = self.write(|conn| {
            let slot = load_slot(conn, org_id, slot_id)?;
            let employee = load_employee(conn, org_id, employee_id)?;
            ensure_active(&employee)?;
            ensure_no_overlap(conn, &slot.schedule_id, employee_id, &slot.interval, None, &slot.id)?;

            let index = match slot_index {
                Some(i) => {
                    if index_taken(conn, &slot.id, i)? {
                        return Err(ShiftdeskError::validation(format!(
                            "slot index {i} is already taken on slot {}",
                            slot.id
                        )));
                    }
                    i
                }
                None => next_free_index(conn, &slot.id)?,
            };
            let assignment = insert_assignment(conn, &slot.id, employee_id, index)?;
            touch_schedule(conn, &slot.schedule_id)?;
            Ok(assignment)
        })?;

        tracing::info!(
            "👤 Assigned {} to slot {} (index {})",
            assignment.employee_id,
            assignment.slot_id,
            assignment.slot_index
        );
        Ok(assignment)
    }

    /// Change a slot's interval and optionally its first occupant in one step.
    ///
    /// Every resulting occupant is re-checked against the new interval,
    /// excluding the slot itself.
    pub fn move_slot(
        &self,
        org_id: &str,
        slot_id: &str,
        interval: Interval,
        employee_id: Option<&str>,
    ) -> Result<SlotWithAssignments> {
        if interval.start >= interval.end {
            return Err(ShiftdeskError::validation(format!(
                "slot start {} is not before end {}",
                interval.start, interval.end
            )));
        }

        let moved = self.write(|conn| {
            let slot = load_slot(conn, org_id, slot_id)?;
            load_schedule(conn, org_id, &slot.schedule_id)?.ensure_covers(&interval)?;
            let occupants = slot_assignments(conn, &slot.id)?;

            let mut final_ids: Vec<&str> = occupants.iter().map(|a| a.employee_id.as_str()).collect();
            if let Some(replacement) = employee_id {
                ensure_active(&load_employee(conn, org_id, replacement)?)?;
                if let Some(pos) = final_ids.iter().skip(1).position(|id| *id == replacement) {
                    return Err(ShiftdeskError::OverlapConflict {
                        employee_id: replacement.to_string(),
                        slot_id: slot.id.clone(),
                        conflicting_slot_id: occupants[pos + 1].slot_id.clone(),
                    });
                }
                match final_ids.first_mut() {
                    Some(first) => *first = replacement,
                    None => final_ids.push(replacement),
                }
            }

            for id in &final_ids {
                ensure_no_overlap(conn, &slot.schedule_id, id, &interval, Some(&slot.id), &slot.id)?;
            }

            conn.execute(
                "UPDATE slots SET start_time=?1, end_time=?2 WHERE id=?3",
                params![datetime_key(interval.start), datetime_key(interval.end), slot.id],
            )
            .map_err(db_err("Update slot"))?;

            if let Some(replacement) = employee_id {
                match occupants.first() {
                    Some(first) if first.employee_id != replacement => {
                        conn.execute(
                            "UPDATE slot_assignments SET employee_id=?1 WHERE id=?2",
                            params![replacement, first.id],
                        )
                        .map_err(db_err("Update assignment"))?;
                    }
                    Some(_) => {}
                    None => {
                        insert_assignment(conn, &slot.id, replacement, 0)?;
                    }
                }
            }
            touch_schedule(conn, &slot.schedule_id)?;

            Ok(SlotWithAssignments {
                slot: load_slot(conn, org_id, &slot.id)?,
                assignments: slot_assignments(conn, &slot.id)?,
            })
        })?;

        tracing::info!(
            "↔️ Slot {} moved to {} {}",
            moved.slot.id,
            moved.slot.interval.date(),
            moved.slot.interval.time_range_label()
        );
        Ok(moved)
    }

    /// Delete an assignment. Returns whether a row was removed; unknown ids are a no-op.
    pub fn remove_assignment(&self, org_id: &str, assignment_id: &str) -> Result<bool> {
        let removed = self.write(|conn| {
            let schedule_id: Option<String> = conn
                .query_row(
                    "SELECT s.schedule_id FROM slot_assignments a
                     JOIN slots s ON s.id = a.slot_id
                     JOIN schedules sc ON sc.id = s.schedule_id
                     WHERE a.id=?1 AND sc.org_id=?2",
                    params![assignment_id, org_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err("Find assignment"))?;
            let Some(schedule_id) = schedule_id else {
                return Ok(false);
            };
            conn.execute("DELETE FROM slot_assignments WHERE id=?1", params![assignment_id])
                .map_err(db_err("Delete assignment"))?;
            touch_schedule(conn, &schedule_id)?;
            Ok(true)
        })?;

        if removed {
            tracing::info!("🗑️ Assignment removed: {assignment_id}");
        } else {
            tracing::debug!("Assignment {assignment_id} already absent");
        }
        Ok(removed)
    }

    /// Assign several employees to one time window.
    ///
    /// The window's slot is reused if one with the exact interval and position
    /// exists, otherwise created with the first successful booking. If nobody
    /// can be booked no slot is created and `slot` stays `None`. Employees that
    /// cannot be booked are skipped and reported; the batch itself only fails
    /// on bad input or storage errors.
    pub fn bulk_assign(
        &self,
        org_id: &str,
        schedule_id: &str,
        employee_ids: &[String],
        interval: Interval,
        position: Option<&str>,
    ) -> Result<BulkAssignOutcome> {
        if employee_ids.is_empty() {
            return Err(ShiftdeskError::validation("bulk assign needs at least one employee"));
        }
        if interval.start >= interval.end {
            return Err(ShiftdeskError::validation(format!(
                "slot start {} is not before end {}",
                interval.start, interval.end
            )));
        }

        let mut seen = HashSet::new();
        let unique: Vec<&str> = employee_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        let outcome = self.write(|conn| {
            let schedule = load_schedule(conn, org_id, schedule_id)?;
            schedule.ensure_covers(&interval)?;
            let required = u32::try_from(unique.len()).unwrap_or(u32::MAX);
            let mut slot = find_window_slot(conn, &schedule.id, &interval, position)?;
            let occupying: HashSet<String> = match &slot {
                Some(slot) => slot_assignments(conn, &slot.id)?
                    .into_iter()
                    .map(|a| a.employee_id)
                    .collect(),
                None => HashSet::new(),
            };

            let mut assignments = Vec::new();
            let mut skipped = Vec::new();
            for employee_id in unique {
                let skip = |reason| BulkSkip {
                    employee_id: employee_id.to_string(),
                    reason,
                };
                if occupying.contains(employee_id) {
                    skipped.push(skip(SkipReason::AlreadyAssigned));
                    continue;
                }
                let employee = match load_employee(conn, org_id, employee_id) {
                    Ok(e) => e,
                    Err(ShiftdeskError::NotFound(_)) => {
                        skipped.push(skip(SkipReason::NotFound));
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                if !employee.active {
                    skipped.push(skip(SkipReason::Inactive));
                    continue;
                }
                let exclude = slot.as_ref().map(|s| s.id.as_str());
                if let Some(conflicting_slot_id) =
                    find_overlap(conn, &schedule.id, employee_id, &interval, exclude)?
                {
                    skipped.push(skip(SkipReason::Overlap { conflicting_slot_id }));
                    continue;
                }
                let target = match slot.take() {
                    Some(existing) => existing,
                    None => create_window_slot(conn, &schedule, interval, position, required)?,
                };
                let index = next_free_index(conn, &target.id)?;
                assignments.push(insert_assignment(conn, &target.id, employee_id, index)?);
                slot = Some(target);
            }
            if !assignments.is_empty() {
                touch_schedule(conn, &schedule.id)?;
            }

            Ok(BulkAssignOutcome {
                slot,
                created: assignments.len(),
                assignments,
                skipped,
            })
        })?;

        match &outcome.slot {
            Some(slot) => tracing::info!(
                "👥 Bulk assign on slot {}: {} created, {} skipped",
                slot.id,
                outcome.created,
                outcome.skipped.len()
            ),
            None => tracing::warn!(
                "👥 Bulk assign booked nobody, all {} skipped; no slot created",
                outcome.skipped.len()
            ),
        }
        for skip in &outcome.skipped {
            tracing::debug!("Bulk assign skipped {}: {:?}", skip.employee_id, skip.reason);
        }
        Ok(outcome)
    }

    /// Book one employee onto the slot matching `interval`/`position`, creating
    /// that slot if needed. Same checks as [`ShiftDb::assign_employee`].
    pub fn assign_to_window(
        &self,
        org_id: &str,
        schedule_id: &str,
        employee_id: &str,
        interval: Interval,
        position: Option<&str>,
    ) -> Result<Assignment> {
        if interval.start >= interval.end {
            return Err(ShiftdeskError::validation(format!(
                "slot start {} is not before end {}",
                interval.start, interval.end
            )));
        }
        let assignment = self.write(|conn| {
            let schedule = load_schedule(conn, org_id, schedule_id)?;
            schedule.ensure_covers(&interval)?;
            ensure_active(&load_employee(conn, org_id, employee_id)?)?;
            let slot = match find_window_slot(conn, &schedule.id, &interval, position)? {
                Some(slot) => slot,
                None => create_window_slot(conn, &schedule, interval, position, 1)?,
            };
            ensure_no_overlap(conn, &schedule.id, employee_id, &interval, None, &slot.id)?;
            let index = next_free_index(conn, &slot.id)?;
            let assignment = insert_assignment(conn, &slot.id, employee_id, index)?;
            touch_schedule(conn, &schedule.id)?;
            Ok(assignment)
        })?;
        tracing::info!(
            "👤 Assigned {} to window slot {}",
            assignment.employee_id,
            assignment.slot_id
        );
        Ok(assignment)
    }
}

fn ensure_active(employee: &Employee) -> Result<()> {
    if employee.active {
        Ok(())
    } else {
        Err(ShiftdeskError::validation(format!(
            "employee {} is inactive",
            employee.id
        )))
    }
}

/// First slot in the schedule where `employee_id` is booked during `interval`.
///
/// Half-open: `existing.start < interval.end AND existing.end > interval.start`.
pub(crate) fn find_overlap(
    conn: &Connection,
    schedule_id: &str,
    employee_id: &str,
    interval: &Interval,
    exclude_slot: Option<&str>,
) -> Result<Option<String>> {
    conn.query_row(
        "SELECT s.id FROM slot_assignments a
         JOIN slots s ON s.id = a.slot_id
         WHERE s.schedule_id=?1 AND a.employee_id=?2
           AND s.start_time < ?3 AND s.end_time > ?4
           AND (?5 IS NULL OR s.id != ?5)
         ORDER BY s.start_time, s.id
         LIMIT 1",
        params![
            schedule_id,
            employee_id,
            datetime_key(interval.end),
            datetime_key(interval.start),
            exclude_slot,
        ],
        |row| row.get(0),
    )
    .optional()
    .map_err(db_err("Overlap check"))
}

fn ensure_no_overlap(
    conn: &Connection,
    schedule_id: &str,
    employee_id: &str,
    interval: &Interval,
    exclude_slot: Option<&str>,
    target_slot: &str,
) -> Result<()> {
    match find_overlap(conn, schedule_id, employee_id, interval, exclude_slot)? {
        Some(conflicting_slot_id) => {
            tracing::warn!(
                "⚠️ Overlap: {employee_id} already booked on {conflicting_slot_id}, rejected for {target_slot}"
            );
            Err(ShiftdeskError::OverlapConflict {
                employee_id: employee_id.to_string(),
                slot_id: target_slot.to_string(),
                conflicting_slot_id,
            })
        }
        None => Ok(()),
    }
}

fn index_taken(conn: &Connection, slot_id: &str, index: u32) -> Result<bool> {
    let n: i64 = conn
        .query_row(
            "SELECT count(*) FROM slot_assignments WHERE slot_id=?1 AND slot_index=?2",
            params![slot_id, index],
            |row| row.get(0),
        )
        .map_err(db_err("Index check"))?;
    Ok(n > 0)
}

/// Lowest ordinal not used by the slot's current occupants.
fn next_free_index(conn: &Connection, slot_id: &str) -> Result<u32> {
    let used: HashSet<u32> = slot_assignments(conn, slot_id)?
        .into_iter()
        .map(|a| a.slot_index)
        .collect();
    Ok((0..).find(|i| !used.contains(i)).unwrap_or(0))
}

fn insert_assignment(
    conn: &Connection,
    slot_id: &str,
    employee_id: &str,
    slot_index: u32,
) -> Result<Assignment> {
    let id = new_id();
    conn.execute(
        "INSERT INTO slot_assignments (id, slot_id, employee_id, slot_index, created_at)
         VALUES (?1,?2,?3,?4,?5)",
        params![id, slot_id, employee_id, slot_index, now_rfc3339()],
    )
    .map_err(db_err("Insert assignment"))?;
    conn.query_row(
        &format!("{ASSIGNMENT_SELECT} WHERE id=?1"),
        params![id],
        row_to_assignment,
    )
    .map_err(db_err("Reload assignment"))
}

/// Slot with exactly this interval and position, if one exists.
fn find_window_slot(
    conn: &Connection,
    schedule_id: &str,
    interval: &Interval,
    position: Option<&str>,
) -> Result<Option<Slot>> {
    conn.query_row(
        &format!(
            "SELECT {SLOT_COLUMNS} FROM slots s
             WHERE s.schedule_id=?1 AND s.start_time=?2 AND s.end_time=?3
               AND IFNULL(s.position, '') = IFNULL(?4, '')
             ORDER BY s.created_at LIMIT 1"
        ),
        params![
            schedule_id,
            datetime_key(interval.start),
            datetime_key(interval.end),
            position,
        ],
        row_to_slot,
    )
    .optional()
    .map_err(db_err("Find window slot"))
}

fn create_window_slot(
    conn: &Connection,
    schedule: &Schedule,
    interval: Interval,
    position: Option<&str>,
    required: u32,
) -> Result<Slot> {
    let counts = SlotCounts {
        required: required.max(1),
        min: schedule.settings.default_min_count,
        max: schedule.settings.default_max_count,
    };
    counts.validate()?;
    let new = NewSlot {
        schedule_id: schedule.id.clone(),
        interval,
        position: position.map(str::to_string),
        required_count: counts.required,
        min_count: counts.min,
        max_count: counts.max,
    };
    insert_slot(conn, &schedule.id, &new, counts)
}
