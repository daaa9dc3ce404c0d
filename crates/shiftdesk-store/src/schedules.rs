//! Schedule and slot records.

use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::{Connection, OptionalExtension, params};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::types::{
    NewSlot, Schedule, ScheduleSettings, ScheduleStatus, Slot, SlotCounts, SlotWithAssignments,
    derive_schedule_name, new_id,
};

use crate::db::{
    SCHEDULE_SELECT, SLOT_COLUMNS, ShiftDb, date_key, datetime_key, db_err, load_schedule,
    load_slot, now_rfc3339, row_to_schedule, row_to_slot, slot_assignments,
};

impl ShiftDb {
    /// Create a DRAFT schedule for the week beginning `week_start` (a Monday).
    pub fn create_schedule(
        &self,
        org_id: &str,
        week_start: NaiveDate,
        name: Option<&str>,
        settings: ScheduleSettings,
    ) -> Result<Schedule> {
        if week_start.weekday() != Weekday::Mon {
            return Err(ShiftdeskError::validation(format!(
                "week start {week_start} is a {:?}, expected a Monday",
                week_start.weekday()
            )));
        }
        settings.validate()?;
        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => derive_schedule_name(week_start),
        };
        let settings_json = serde_json::to_string(&settings)?;

        let schedule = self.write(|conn| {
            let org_known: bool = conn
                .query_row(
                    "SELECT count(*) FROM organizations WHERE id=?1",
                    params![org_id],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(db_err("Get organization"))?
                > 0;
            if !org_known {
                return Err(ShiftdeskError::not_found("organization", org_id));
            }

            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM schedules WHERE org_id=?1 AND week_start=?2",
                    params![org_id, date_key(week_start)],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err("Find schedule"))?;
            if let Some(id) = existing {
                return Err(ShiftdeskError::validation(format!(
                    "a schedule for week {week_start} already exists ({id})"
                )));
            }

            let id = new_id();
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO schedules (id, org_id, week_start, name, status, settings, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?7)",
                params![
                    id,
                    org_id,
                    date_key(week_start),
                    name,
                    ScheduleStatus::Draft.as_str(),
                    settings_json,
                    now,
                ],
            )
            .map_err(db_err("Insert schedule"))?;
            load_schedule(conn, org_id, &id)
        })?;

        tracing::info!("📅 Schedule created: {} ({})", schedule.name, schedule.id);
        Ok(schedule)
    }

    pub fn get_schedule(&self, org_id: &str, id: &str) -> Result<Schedule> {
        let conn = self.lock()?;
        load_schedule(&conn, org_id, id)
    }

    /// The schedule covering `week_start`, if one exists.
    pub fn find_schedule(&self, org_id: &str, week_start: NaiveDate) -> Result<Option<Schedule>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{SCHEDULE_SELECT} WHERE org_id=?1 AND week_start=?2"),
            params![org_id, date_key(week_start)],
            row_to_schedule,
        )
        .optional()
        .map_err(db_err("Find schedule"))
    }

    /// Newest week first.
    pub fn list_schedules(&self, org_id: &str) -> Result<Vec<Schedule>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SCHEDULE_SELECT} WHERE org_id=?1 ORDER BY week_start DESC"))
            .map_err(db_err("Prepare"))?;
        let schedules = stmt
            .query_map(params![org_id], row_to_schedule)
            .map_err(db_err("Query schedules"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read schedules"))?;
        Ok(schedules)
    }

    /// Create a slot. Unset min/max counts come from the schedule's defaults.
    pub fn create_slot(&self, org_id: &str, new: &NewSlot) -> Result<Slot> {
        if new.interval.start >= new.interval.end {
            return Err(ShiftdeskError::validation(format!(
                "slot start {} is not before end {}",
                new.interval.start, new.interval.end
            )));
        }

        let slot = self.write(|conn| {
            let schedule = load_schedule(conn, org_id, &new.schedule_id).map_err(|e| match e {
                ShiftdeskError::NotFound(what) => {
                    ShiftdeskError::validation(format!("{what} does not resolve"))
                }
                other => other,
            })?;
            schedule.ensure_covers(&new.interval)?;
            let counts = SlotCounts {
                required: new.required_count,
                min: new.min_count.or(schedule.settings.default_min_count),
                max: new.max_count.or(schedule.settings.default_max_count),
            };
            counts.validate()?;
            insert_slot(conn, &schedule.id, new, counts)
        })?;

        tracing::info!(
            "🧩 Slot created: {} {} ({})",
            slot.interval.date(),
            slot.interval.time_range_label(),
            slot.id
        );
        Ok(slot)
    }

    pub fn get_slot(&self, org_id: &str, slot_id: &str) -> Result<SlotWithAssignments> {
        self.read(|conn| {
            let slot = load_slot(conn, org_id, slot_id)?;
            let assignments = slot_assignments(conn, &slot.id)?;
            Ok(SlotWithAssignments { slot, assignments })
        })
    }

    /// Every slot of the schedule with its occupants, ordered by start time.
    pub fn slots_with_assignments(
        &self,
        org_id: &str,
        schedule_id: &str,
    ) -> Result<Vec<SlotWithAssignments>> {
        self.read(|conn| {
            load_schedule(conn, org_id, schedule_id)?;
            load_slots_with_assignments(conn, schedule_id)
        })
    }
}

pub(crate) fn insert_slot(
    conn: &Connection,
    schedule_id: &str,
    new: &NewSlot,
    counts: SlotCounts,
) -> Result<Slot> {
    let id = new_id();
    conn.execute(
        "INSERT INTO slots (id, schedule_id, start_time, end_time, position, required_count, min_count, max_count, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            id,
            schedule_id,
            datetime_key(new.interval.start),
            datetime_key(new.interval.end),
            new.position,
            counts.required,
            counts.min,
            counts.max,
            now_rfc3339(),
        ],
    )
    .map_err(db_err("Insert slot"))?;
    touch_schedule(conn, schedule_id)?;
    conn.query_row(
        &format!("SELECT {SLOT_COLUMNS} FROM slots s WHERE s.id=?1"),
        params![id],
        row_to_slot,
    )
    .map_err(db_err("Reload slot"))
}

pub(crate) fn load_slots(conn: &Connection, schedule_id: &str) -> Result<Vec<Slot>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {SLOT_COLUMNS} FROM slots s WHERE s.schedule_id=?1 ORDER BY s.start_time, s.id"
        ))
        .map_err(db_err("Prepare"))?;
    let slots = stmt
        .query_map(params![schedule_id], row_to_slot)
        .map_err(db_err("Query slots"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("Read slots"))?;
    Ok(slots)
}

pub(crate) fn load_slots_with_assignments(
    conn: &Connection,
    schedule_id: &str,
) -> Result<Vec<SlotWithAssignments>> {
    load_slots(conn, schedule_id)?
        .into_iter()
        .map(|slot| {
            let assignments = slot_assignments(conn, &slot.id)?;
            Ok(SlotWithAssignments { slot, assignments })
        })
        .collect()
}

pub(crate) fn touch_schedule(conn: &Connection, schedule_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE schedules SET updated_at=?1 WHERE id=?2",
        params![now_rfc3339(), schedule_id],
    )
    .map_err(db_err("Touch schedule"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftdesk_core::types::{Interval, Organization};
    use std::path::PathBuf;

    fn temp_db() -> ShiftDb {
        let db = ShiftDb::open(&PathBuf::from(":memory:")).unwrap();
        db.upsert_organization(&Organization {
            id: "org-a".into(),
            name: "Acme".into(),
        })
        .unwrap();
        db
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_create_schedule_rules() {
        let db = temp_db();
        let s = db
            .create_schedule("org-a", monday(), None, ScheduleSettings::default())
            .unwrap();
        assert_eq!(s.status, ScheduleStatus::Draft);
        assert_eq!(s.name, "Week of Jun 03 – Jun 09, 2024");

        // one schedule per week
        let dup = db.create_schedule("org-a", monday(), Some("Again"), ScheduleSettings::default());
        assert!(matches!(dup, Err(ShiftdeskError::Validation(_))));

        let tuesday = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        assert!(matches!(
            db.create_schedule("org-a", tuesday, None, ScheduleSettings::default()),
            Err(ShiftdeskError::Validation(_))
        ));
        assert!(matches!(
            db.create_schedule("org-x", monday(), None, ScheduleSettings::default()),
            Err(ShiftdeskError::NotFound(_))
        ));
        assert_eq!(db.find_schedule("org-a", monday()).unwrap().unwrap().id, s.id);
    }

    #[test]
    fn test_create_slot_defaults_and_scope() {
        let db = temp_db();
        let settings = ScheduleSettings {
            default_min_count: Some(1),
            default_max_count: Some(3),
            ..Default::default()
        };
        let s = db.create_schedule("org-a", monday(), None, settings).unwrap();
        let new = NewSlot {
            schedule_id: s.id.clone(),
            interval: Interval::parse("2024-06-03T09:00", "2024-06-03T17:00").unwrap(),
            position: Some("cashier".into()),
            required_count: 2,
            min_count: None,
            max_count: Some(2),
        };
        let slot = db.create_slot("org-a", &new).unwrap();
        assert_eq!(slot.counts.min, Some(1));
        assert_eq!(slot.counts.max, Some(2));

        // another tenant cannot resolve the schedule
        assert!(matches!(
            db.create_slot("org-b", &new),
            Err(ShiftdeskError::Validation(_))
        ));
        assert!(matches!(
            db.get_slot("org-b", &slot.id),
            Err(ShiftdeskError::NotFound(_))
        ));

        let inverted = NewSlot {
            interval: Interval {
                start: new.interval.end,
                end: new.interval.start,
            },
            ..new.clone()
        };
        assert!(db.create_slot("org-a", &inverted).is_err());

        let bad_counts = NewSlot {
            required_count: 0,
            ..new.clone()
        };
        assert!(db.create_slot("org-a", &bad_counts).is_err());

        assert_eq!(db.slots_with_assignments("org-a", &s.id).unwrap().len(), 1);
    }
}
