//! Published version snapshots and the publish transaction.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::types::{
    Schedule, ScheduleStatus, ScheduleVersion, SlotWithAssignments, VersionSnapshot,
};
use std::collections::HashMap;

use crate::db::{ShiftDb, col_utc, db_err, load_schedule, now_rfc3339};
use crate::directory::employee_names;
use crate::schedules::load_slots_with_assignments;

/// Everything a publish needs, read inside one transaction.
#[derive(Debug, Clone)]
pub struct PublishState {
    pub schedule: Schedule,
    pub slots: Vec<SlotWithAssignments>,
    /// Most recent version, `None` before the first publish.
    pub previous: Option<ScheduleVersion>,
    /// Snapshot of the current rows.
    pub current: VersionSnapshot,
    /// employee id → display name.
    pub employee_names: HashMap<String, String>,
}

impl PublishState {
    pub fn is_first_publish(&self) -> bool {
        self.previous.is_none()
    }

    /// Snapshot to diff against; empty before the first publish.
    pub fn baseline(&self) -> VersionSnapshot {
        self.previous
            .as_ref()
            .map(|v| v.snapshot.clone())
            .unwrap_or_default()
    }

    pub fn next_version(&self) -> u32 {
        self.previous.as_ref().map_or(1, |v| v.version + 1)
    }
}

impl ShiftDb {
    /// Snapshot the schedule, run `f` over the state, then write version N+1
    /// and flip the status to PUBLISHED.
    ///
    /// All of it is one transaction: if `f` or any write fails, no version is
    /// recorded and the status is left as it was.
    pub fn publish<T>(
        &self,
        org_id: &str,
        schedule_id: &str,
        f: impl FnOnce(&PublishState) -> Result<T>,
    ) -> Result<(ScheduleVersion, T)> {
        let (version, out) = self.write(|conn| {
            let state = load_publish_state(conn, org_id, schedule_id)?;
            let out = f(&state)?;

            let version = ScheduleVersion {
                schedule_id: state.schedule.id.clone(),
                version: state.next_version(),
                snapshot: state.current,
                created_at: Utc::now(),
            };
            conn.execute(
                "INSERT INTO schedule_versions (schedule_id, version, slot_snapshot, created_at)
                 VALUES (?1,?2,?3,?4)",
                params![
                    version.schedule_id,
                    version.version,
                    version.snapshot.to_json()?,
                    version.created_at.to_rfc3339(),
                ],
            )
            .map_err(db_err("Insert version"))?;
            conn.execute(
                "UPDATE schedules SET status=?1, updated_at=?2 WHERE id=?3",
                params![ScheduleStatus::Published.as_str(), now_rfc3339(), version.schedule_id],
            )
            .map_err(db_err("Update status"))?;
            Ok((version, out))
        })?;

        tracing::info!(
            "📣 Schedule {} published as v{} ({} slots)",
            version.schedule_id,
            version.version,
            version.snapshot.slots.len()
        );
        Ok((version, out))
    }

    /// The same consistent read `publish` performs, with no writes.
    pub fn publish_preview(&self, org_id: &str, schedule_id: &str) -> Result<PublishState> {
        self.read(|conn| load_publish_state(conn, org_id, schedule_id))
    }

    pub fn latest_version(&self, org_id: &str, schedule_id: &str) -> Result<Option<ScheduleVersion>> {
        self.read(|conn| {
            load_schedule(conn, org_id, schedule_id)?;
            latest_version(conn, schedule_id)
        })
    }

    /// Every version of the schedule, oldest first.
    pub fn list_versions(&self, org_id: &str, schedule_id: &str) -> Result<Vec<ScheduleVersion>> {
        self.read(|conn| {
            load_schedule(conn, org_id, schedule_id)?;
            let mut stmt = conn
                .prepare(
                    "SELECT schedule_id, version, slot_snapshot, created_at FROM schedule_versions
                     WHERE schedule_id=?1 ORDER BY version",
                )
                .map_err(db_err("Prepare"))?;
            let rows = stmt
                .query_map(params![schedule_id], raw_version)
                .map_err(db_err("Query versions"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Read versions"))?;
            rows.into_iter().map(RawVersion::decode).collect()
        })
    }
}

fn load_publish_state(conn: &Connection, org_id: &str, schedule_id: &str) -> Result<PublishState> {
    let schedule = load_schedule(conn, org_id, schedule_id)?;
    let slots = load_slots_with_assignments(conn, &schedule.id)?;
    let previous = latest_version(conn, &schedule.id)?;
    let current = VersionSnapshot::from_slots(&slots);
    let employee_names = employee_names(conn, org_id)?;
    Ok(PublishState {
        schedule,
        slots,
        previous,
        current,
        employee_names,
    })
}

/// Row as stored; the snapshot JSON is validated in [`RawVersion::decode`].
struct RawVersion {
    schedule_id: String,
    version: u32,
    snapshot: String,
    created_at: DateTime<Utc>,
}

impl RawVersion {
    fn decode(self) -> Result<ScheduleVersion> {
        let snapshot = VersionSnapshot::from_json(&self.snapshot).map_err(|e| {
            ShiftdeskError::Database(format!(
                "version {} of schedule {}: {e}",
                self.version, self.schedule_id
            ))
        })?;
        Ok(ScheduleVersion {
            schedule_id: self.schedule_id,
            version: self.version,
            snapshot,
            created_at: self.created_at,
        })
    }
}

fn raw_version(row: &rusqlite::Row) -> rusqlite::Result<RawVersion> {
    Ok(RawVersion {
        schedule_id: row.get(0)?,
        version: row.get(1)?,
        snapshot: row.get(2)?,
        created_at: col_utc(row, 3)?,
    })
}

fn latest_version(conn: &Connection, schedule_id: &str) -> Result<Option<ScheduleVersion>> {
    conn.query_row(
        "SELECT schedule_id, version, slot_snapshot, created_at FROM schedule_versions
         WHERE schedule_id=?1 ORDER BY version DESC LIMIT 1",
        params![schedule_id],
        raw_version,
    )
    .optional()
    .map_err(db_err("Latest version"))?
    .map(RawVersion::decode)
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shiftdesk_core::types::{
        AvailabilityTemplate, Employee, Interval, NewSlot, Organization, ScheduleSettings,
    };
    use std::path::PathBuf;

    const ORG: &str = "org-a";

    fn seeded() -> (ShiftDb, Schedule) {
        let db = ShiftDb::open(&PathBuf::from(":memory:")).unwrap();
        db.upsert_organization(&Organization {
            id: ORG.into(),
            name: "Acme".into(),
        })
        .unwrap();
        db.upsert_employee(&Employee {
            id: "e1".into(),
            org_id: ORG.into(),
            user_id: None,
            display_name: "Ada".into(),
            role: None,
            default_weekly_hours: 40.0,
            availability: AvailabilityTemplate::default(),
            active: true,
        })
        .unwrap();
        let schedule = db
            .create_schedule(
                ORG,
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                None,
                ScheduleSettings::default(),
            )
            .unwrap();
        let slot = db
            .create_slot(
                ORG,
                &NewSlot {
                    schedule_id: schedule.id.clone(),
                    interval: Interval::parse("2024-06-03T09:00", "2024-06-03T17:00").unwrap(),
                    position: None,
                    required_count: 1,
                    min_count: None,
                    max_count: None,
                },
            )
            .unwrap();
        db.assign_employee(ORG, &slot.id, "e1", None).unwrap();
        (db, schedule)
    }

    #[test]
    fn test_publish_increments_versions() {
        let (db, schedule) = seeded();
        let (v1, first) = db
            .publish(ORG, &schedule.id, |s| Ok(s.is_first_publish()))
            .unwrap();
        assert_eq!(v1.version, 1);
        assert!(first);
        assert_eq!(
            db.get_schedule(ORG, &schedule.id).unwrap().status,
            ScheduleStatus::Published
        );

        let (v2, first) = db
            .publish(ORG, &schedule.id, |s| Ok(s.is_first_publish()))
            .unwrap();
        assert_eq!(v2.version, 2);
        assert!(!first);
        assert_eq!(v2.snapshot, v1.snapshot);

        let all = db.list_versions(ORG, &schedule.id).unwrap();
        assert_eq!(all.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(db.latest_version(ORG, &schedule.id).unwrap().unwrap().version, 2);
    }

    #[test]
    fn test_failed_publish_leaves_state_untouched() {
        let (db, schedule) = seeded();
        let res: Result<(ScheduleVersion, ())> = db.publish(ORG, &schedule.id, |_| {
            Err(ShiftdeskError::validation("diff failed"))
        });
        assert!(res.is_err());
        assert!(db.latest_version(ORG, &schedule.id).unwrap().is_none());
        assert_eq!(
            db.get_schedule(ORG, &schedule.id).unwrap().status,
            ScheduleStatus::Draft
        );
    }

    #[test]
    fn test_corrupt_snapshot_is_rejected_on_read() {
        let (db, schedule) = seeded();
        db.lock()
            .unwrap()
            .execute(
                "INSERT INTO schedule_versions (schedule_id, version, slot_snapshot, created_at)
                 VALUES (?1, 1, '{\"schema\":1,\"slots\":{\"x\":{\"extra\":true}}}', ?2)",
                params![schedule.id, now_rfc3339()],
            )
            .unwrap();
        assert!(matches!(
            db.latest_version(ORG, &schedule.id),
            Err(ShiftdeskError::Database(_))
        ));
    }

    #[test]
    fn test_preview_writes_nothing() {
        let (db, schedule) = seeded();
        let state = db.publish_preview(ORG, &schedule.id).unwrap();
        assert!(state.is_first_publish());
        assert_eq!(state.current.slots.len(), 1);
        assert_eq!(state.employee_names["e1"], "Ada");
        assert!(db.list_versions(ORG, &schedule.id).unwrap().is_empty());
    }
}
