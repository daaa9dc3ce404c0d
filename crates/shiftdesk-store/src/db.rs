//! Connection management, schema migrations and row conversion helpers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, TransactionBehavior, params};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::types::{
    Assignment, DATETIME_FORMAT, Employee, Interval, Schedule, ScheduleSettings, Slot, SlotCounts,
};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Shiftdesk database: one connection per handle.
///
/// Open one handle per service instance; SQLite's own locking serialises
/// writers across handles.
pub struct ShiftDb {
    conn: Mutex<Connection>,
}

impl ShiftDb {
    /// Open or create the database. `":memory:"` gives a private in-memory store.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, 5000)
    }

    pub fn open_with(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err("DB open"))?;

        // WAL lets readers proceed while a writer holds the lock.
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        ))
        .map_err(db_err("DB pragma"))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        tracing::debug!("🗄️ Shift store opened at {}", path.display());
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                user_id TEXT,
                display_name TEXT NOT NULL,
                role TEXT,
                default_weekly_hours REAL NOT NULL DEFAULT 0,
                availability TEXT NOT NULL DEFAULT '{}',   -- JSON: weekday -> [\"09:00\", ...]
                active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_employees_org ON employees(org_id);

            CREATE TABLE IF NOT EXISTS employee_leaves (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_id TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT NOT NULL,                    -- inclusive
                kind TEXT NOT NULL DEFAULT 'other',
                note TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_leaves_employee ON employee_leaves(employee_id, start_date);

            CREATE TABLE IF NOT EXISTS employee_groups (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(org_id, name)
            );

            CREATE TABLE IF NOT EXISTS employee_group_members (
                group_id TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                PRIMARY KEY (group_id, employee_id)
            );

            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                org_id TEXT NOT NULL,
                week_start TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'DRAFT',
                settings TEXT NOT NULL DEFAULT '{}',       -- JSON ScheduleSettings
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(org_id, week_start)
            );

            CREATE TABLE IF NOT EXISTS slots (
                id TEXT PRIMARY KEY,
                schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                position TEXT,
                required_count INTEGER NOT NULL DEFAULT 1,
                min_count INTEGER,
                max_count INTEGER,
                created_at TEXT NOT NULL,
                CHECK (start_time < end_time),
                CHECK (required_count >= 1)
            );
            CREATE INDEX IF NOT EXISTS idx_slots_schedule ON slots(schedule_id, start_time);

            CREATE TABLE IF NOT EXISTS slot_assignments (
                id TEXT PRIMARY KEY,
                slot_id TEXT NOT NULL REFERENCES slots(id) ON DELETE CASCADE,
                employee_id TEXT NOT NULL,
                slot_index INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(slot_id, slot_index)
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_employee ON slot_assignments(employee_id);

            CREATE TABLE IF NOT EXISTS schedule_versions (
                schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
                version INTEGER NOT NULL,
                slot_snapshot TEXT NOT NULL,               -- JSON VersionSnapshot
                created_at TEXT NOT NULL,
                PRIMARY KEY (schedule_id, version)
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schedule_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                employee_id TEXT NOT NULL,
                user_id TEXT,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                channel TEXT NOT NULL,
                status TEXT NOT NULL,                      -- sent, failed, unreachable
                error TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_schedule ON notifications(schedule_id, version);
            ",
        )
        .map_err(db_err("Migration"))?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ShiftdeskError::Database(format!("Lock: {e}")))
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction; commit on `Ok`, roll back on `Err`.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err("Begin"))?;
        let out = f(&tx)?;
        tx.commit().map_err(db_err("Commit"))?;
        Ok(out)
    }

    /// Run `f` inside a deferred (read) transaction for a consistent view.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(db_err("Begin"))?;
        let out = f(&tx)?;
        tx.finish().map_err(db_err("Finish"))?;
        Ok(out)
    }
}

/// Map a rusqlite error into `ShiftdeskError::Database` with context.
pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> ShiftdeskError {
    move |e| ShiftdeskError::Database(format!("{context}: {e}"))
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn col_utc(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn col_datetime(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn col_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

pub(crate) fn col_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub(crate) fn datetime_key(t: NaiveDateTime) -> String {
    t.format(DATETIME_FORMAT).to_string()
}

// ─── Row mappers ──────────────────────────────────────────────

pub(crate) const SCHEDULE_SELECT: &str =
    "SELECT id, org_id, week_start, name, status, settings, created_at, updated_at FROM schedules";

pub(crate) fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
    let status: String = row.get(4)?;
    let settings: ScheduleSettings = col_json(row, 5)?;
    Ok(Schedule {
        id: row.get(0)?,
        org_id: row.get(1)?,
        week_start: col_date(row, 2)?,
        name: row.get(3)?,
        status: status.parse().map_err(|e| conversion_err(4, e))?,
        settings,
        created_at: col_utc(row, 6)?,
        updated_at: col_utc(row, 7)?,
    })
}

/// Columns prefixed `s.` so the list can be used in joins against `schedules sc`.
pub(crate) const SLOT_COLUMNS: &str =
    "s.id, s.schedule_id, s.start_time, s.end_time, s.position, s.required_count, s.min_count, s.max_count, s.created_at";

pub(crate) fn row_to_slot(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        interval: Interval {
            start: col_datetime(row, 2)?,
            end: col_datetime(row, 3)?,
        },
        position: row.get(4)?,
        counts: SlotCounts {
            required: row.get(5)?,
            min: row.get(6)?,
            max: row.get(7)?,
        },
        created_at: col_utc(row, 8)?,
    })
}

pub(crate) const ASSIGNMENT_SELECT: &str =
    "SELECT id, slot_id, employee_id, slot_index, created_at FROM slot_assignments";

pub(crate) fn row_to_assignment(row: &rusqlite::Row) -> rusqlite::Result<Assignment> {
    Ok(Assignment {
        id: row.get(0)?,
        slot_id: row.get(1)?,
        employee_id: row.get(2)?,
        slot_index: row.get(3)?,
        created_at: col_utc(row, 4)?,
    })
}

pub(crate) const EMPLOYEE_SELECT: &str = "SELECT id, org_id, user_id, display_name, role, default_weekly_hours, availability, active FROM employees";

pub(crate) fn row_to_employee(row: &rusqlite::Row) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        org_id: row.get(1)?,
        user_id: row.get(2)?,
        display_name: row.get(3)?,
        role: row.get(4)?,
        default_weekly_hours: row.get(5)?,
        availability: col_json(row, 6)?,
        active: row.get(7)?,
    })
}

// ─── Shared lookups (usable inside any transaction) ───────────

pub(crate) fn load_schedule(conn: &Connection, org_id: &str, id: &str) -> Result<Schedule> {
    match conn.query_row(
        &format!("{SCHEDULE_SELECT} WHERE id=?1 AND org_id=?2"),
        params![id, org_id],
        row_to_schedule,
    ) {
        Ok(s) => Ok(s),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(ShiftdeskError::not_found("schedule", id)),
        Err(e) => Err(db_err("Get schedule")(e)),
    }
}

pub(crate) fn load_slot(conn: &Connection, org_id: &str, slot_id: &str) -> Result<Slot> {
    match conn.query_row(
        &format!(
            "SELECT {SLOT_COLUMNS} FROM slots s JOIN schedules sc ON sc.id = s.schedule_id
             WHERE s.id=?1 AND sc.org_id=?2"
        ),
        params![slot_id, org_id],
        row_to_slot,
    ) {
        Ok(s) => Ok(s),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(ShiftdeskError::not_found("slot", slot_id)),
        Err(e) => Err(db_err("Get slot")(e)),
    }
}

pub(crate) fn load_employee(conn: &Connection, org_id: &str, id: &str) -> Result<Employee> {
    match conn.query_row(
        &format!("{EMPLOYEE_SELECT} WHERE id=?1 AND org_id=?2"),
        params![id, org_id],
        row_to_employee,
    ) {
        Ok(e) => Ok(e),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(ShiftdeskError::not_found("employee", id)),
        Err(e) => Err(db_err("Get employee")(e)),
    }
}

pub(crate) fn slot_assignments(conn: &Connection, slot_id: &str) -> Result<Vec<Assignment>> {
    let mut stmt = conn
        .prepare(&format!("{ASSIGNMENT_SELECT} WHERE slot_id=?1 ORDER BY slot_index"))
        .map_err(db_err("Prepare"))?;
    let rows = stmt
        .query_map(params![slot_id], row_to_assignment)
        .map_err(db_err("Query assignments"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("Read assignments"))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_and_migrate_twice() {
        let dir = std::env::temp_dir().join(format!("shiftdesk-db-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("migrate.db");
        {
            let _db = ShiftDb::open(&path).unwrap();
        }
        // migrations are idempotent
        let db = ShiftDb::open(&path).unwrap();
        let count: i64 = db
            .lock()
            .unwrap()
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='slot_assignments'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let db = ShiftDb::open(&PathBuf::from(":memory:")).unwrap();
        let res: Result<()> = db.write(|conn| {
            conn.execute(
                "INSERT INTO organizations (id, name) VALUES ('o1', 'Acme')",
                [],
            )
            .map_err(db_err("Insert"))?;
            Err(ShiftdeskError::validation("abort"))
        });
        assert!(res.is_err());
        let count: i64 = db
            .lock()
            .unwrap()
            .query_row("SELECT count(*) FROM organizations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
