//! Organizations, employees, groups and leave.
//!
//! The engine treats these as read-only inputs; the write methods exist for the
//! external collaborators that own them (importers, admin tooling, tests).

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, params};
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::AvailabilityProvider;
use shiftdesk_core::types::{
    AvailabilityTemplate, Employee, EmployeeGroup, LeaveInterval, LeaveKind, Organization,
};
use std::collections::{HashMap, HashSet};

use crate::db::{
    EMPLOYEE_SELECT, ShiftDb, col_date, col_datetime, date_key, datetime_key, db_err,
    load_employee, row_to_employee,
};

impl ShiftDb {
    // ── Organizations ──────────────────────────────────────

    pub fn upsert_organization(&self, org: &Organization) -> Result<()> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO organizations (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name=excluded.name",
                params![org.id, org.name],
            )
            .map_err(db_err("Upsert organization"))?;
            Ok(())
        })
    }

    pub fn get_organization(&self, id: &str) -> Result<Organization> {
        let conn = self.lock()?;
        match conn.query_row(
            "SELECT id, name FROM organizations WHERE id=?1",
            params![id],
            |row| {
                Ok(Organization {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        ) {
            Ok(o) => Ok(o),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(ShiftdeskError::not_found("organization", id))
            }
            Err(e) => Err(db_err("Get organization")(e)),
        }
    }

    // ── Employees ──────────────────────────────────────────

    pub fn upsert_employee(&self, employee: &Employee) -> Result<()> {
        let availability = serde_json::to_string(&employee.availability)?;
        self.write(|conn| {
            conn.execute(
                "INSERT INTO employees (id, org_id, user_id, display_name, role, default_weekly_hours, availability, active)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                 ON CONFLICT(id) DO UPDATE SET
                    user_id=excluded.user_id, display_name=excluded.display_name, role=excluded.role,
                    default_weekly_hours=excluded.default_weekly_hours,
                    availability=excluded.availability, active=excluded.active
                 WHERE employees.org_id = excluded.org_id",
                params![
                    employee.id,
                    employee.org_id,
                    employee.user_id,
                    employee.display_name,
                    employee.role,
                    employee.default_weekly_hours,
                    availability,
                    employee.active,
                ],
            )
            .map_err(db_err("Upsert employee"))?;
            Ok(())
        })
    }

    pub fn get_employee(&self, org_id: &str, id: &str) -> Result<Employee> {
        let conn = self.lock()?;
        load_employee(&conn, org_id, id)
    }

    /// Employees ordered by id.
    pub fn list_employees(&self, org_id: &str, active_only: bool) -> Result<Vec<Employee>> {
        let conn = self.lock()?;
        list_employees(&conn, org_id, active_only)
    }

    /// id → display name for every employee in the organization.
    pub fn employee_names(&self, org_id: &str) -> Result<HashMap<String, String>> {
        let conn = self.lock()?;
        employee_names(&conn, org_id)
    }

    // ── Leave ──────────────────────────────────────────────

    pub fn add_leave(&self, org_id: &str, leave: &LeaveInterval) -> Result<()> {
        if leave.start_date > leave.end_date {
            return Err(ShiftdeskError::validation(format!(
                "leave starts {} after it ends {}",
                leave.start_date, leave.end_date
            )));
        }
        self.write(|conn| {
            load_employee(conn, org_id, &leave.employee_id)?;
            conn.execute(
                "INSERT INTO employee_leaves (employee_id, start_date, end_date, kind, note)
                 VALUES (?1,?2,?3,?4,?5)",
                params![
                    leave.employee_id,
                    date_key(leave.start_date),
                    date_key(leave.end_date),
                    leave.kind.as_str(),
                    leave.note,
                ],
            )
            .map_err(db_err("Insert leave"))?;
            Ok(())
        })
    }

    // ── Groups ─────────────────────────────────────────────

    /// Create or replace a group and its membership.
    pub fn upsert_group(&self, group: &EmployeeGroup) -> Result<()> {
        self.write(|conn| {
            conn.execute(
                "INSERT INTO employee_groups (id, org_id, name) VALUES (?1,?2,?3)
                 ON CONFLICT(id) DO UPDATE SET name=excluded.name",
                params![group.id, group.org_id, group.name],
            )
            .map_err(db_err("Upsert group"))?;
            conn.execute(
                "DELETE FROM employee_group_members WHERE group_id=?1",
                params![group.id],
            )
            .map_err(db_err("Clear group members"))?;
            for employee_id in &group.employee_ids {
                load_employee(conn, &group.org_id, employee_id)?;
                conn.execute(
                    "INSERT OR IGNORE INTO employee_group_members (group_id, employee_id) VALUES (?1,?2)",
                    params![group.id, employee_id],
                )
                .map_err(db_err("Insert group member"))?;
            }
            Ok(())
        })
    }

    pub fn list_groups(&self, org_id: &str) -> Result<Vec<EmployeeGroup>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, org_id, name FROM employee_groups WHERE org_id=?1 ORDER BY name")
            .map_err(db_err("Prepare"))?;
        let mut groups = stmt
            .query_map(params![org_id], |row| {
                Ok(EmployeeGroup {
                    id: row.get(0)?,
                    org_id: row.get(1)?,
                    name: row.get(2)?,
                    employee_ids: Vec::new(),
                })
            })
            .map_err(db_err("Query groups"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read groups"))?;
        for group in &mut groups {
            group.employee_ids = group_members(&conn, &group.id)?;
        }
        Ok(groups)
    }

    /// Union of member ids across `group_ids` (scoped to the organization).
    pub fn group_member_ids(&self, org_id: &str, group_ids: &[String]) -> Result<HashSet<String>> {
        let conn = self.lock()?;
        let mut members = HashSet::new();
        for group_id in group_ids {
            let owned: bool = conn
                .query_row(
                    "SELECT count(*) FROM employee_groups WHERE id=?1 AND org_id=?2",
                    params![group_id, org_id],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(db_err("Get group"))?
                > 0;
            if !owned {
                return Err(ShiftdeskError::not_found("group", group_id));
            }
            members.extend(group_members(&conn, group_id)?);
        }
        Ok(members)
    }

    // ── Load history ───────────────────────────────────────

    /// Latest shift end strictly before `before`, per employee.
    pub fn last_assigned_end(
        &self,
        org_id: &str,
        before: NaiveDateTime,
    ) -> Result<HashMap<String, NaiveDateTime>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT a.employee_id, MAX(s.end_time)
                 FROM slot_assignments a
                 JOIN slots s ON s.id = a.slot_id
                 JOIN schedules sc ON sc.id = s.schedule_id
                 WHERE sc.org_id=?1 AND s.end_time <= ?2
                 GROUP BY a.employee_id",
            )
            .map_err(db_err("Prepare"))?;
        let rows = stmt
            .query_map(params![org_id, datetime_key(before)], |row| {
                Ok((row.get::<_, String>(0)?, col_datetime(row, 1)?))
            })
            .map_err(db_err("Query last shift"))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .map_err(db_err("Read last shift"))?;
        Ok(rows)
    }

    /// Hours worked per employee on slots starting in `[from, to)`.
    pub fn hours_in_range(
        &self,
        org_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<HashMap<String, f64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT a.employee_id, s.start_time, s.end_time
                 FROM slot_assignments a
                 JOIN slots s ON s.id = a.slot_id
                 JOIN schedules sc ON sc.id = s.schedule_id
                 WHERE sc.org_id=?1 AND s.start_time >= ?2 AND s.start_time < ?3",
            )
            .map_err(db_err("Prepare"))?;
        let rows = stmt
            .query_map(params![org_id, datetime_key(from), datetime_key(to)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    col_datetime(row, 1)?,
                    col_datetime(row, 2)?,
                ))
            })
            .map_err(db_err("Query hours"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read hours"))?;

        let mut hours: HashMap<String, f64> = HashMap::new();
        for (employee_id, start, end) in rows {
            *hours.entry(employee_id).or_default() += (end - start).num_seconds() as f64 / 3600.0;
        }
        Ok(hours)
    }
}

impl AvailabilityProvider for ShiftDb {
    fn availability(&self, org_id: &str, employee_id: &str) -> Result<AvailabilityTemplate> {
        Ok(self.get_employee(org_id, employee_id)?.availability)
    }

    fn leaves(
        &self,
        org_id: &str,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveInterval>> {
        let conn = self.lock()?;
        load_employee(&conn, org_id, employee_id)?;
        let mut stmt = conn
            .prepare(
                "SELECT employee_id, start_date, end_date, kind, note FROM employee_leaves
                 WHERE employee_id=?1 AND start_date <= ?3 AND end_date >= ?2
                 ORDER BY start_date",
            )
            .map_err(db_err("Prepare"))?;
        let leaves = stmt
            .query_map(params![employee_id, date_key(from), date_key(to)], |row| {
                Ok(LeaveInterval {
                    employee_id: row.get(0)?,
                    start_date: col_date(row, 1)?,
                    end_date: col_date(row, 2)?,
                    kind: LeaveKind::parse(&row.get::<_, String>(3)?),
                    note: row.get(4)?,
                })
            })
            .map_err(db_err("Query leaves"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read leaves"))?;
        Ok(leaves)
    }
}

pub(crate) fn list_employees(
    conn: &Connection,
    org_id: &str,
    active_only: bool,
) -> Result<Vec<Employee>> {
    let sql = if active_only {
        format!("{EMPLOYEE_SELECT} WHERE org_id=?1 AND active=1 ORDER BY id")
    } else {
        format!("{EMPLOYEE_SELECT} WHERE org_id=?1 ORDER BY id")
    };
    let mut stmt = conn.prepare(&sql).map_err(db_err("Prepare"))?;
    let employees = stmt
        .query_map(params![org_id], row_to_employee)
        .map_err(db_err("Query employees"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err("Read employees"))?;
    Ok(employees)
}

pub(crate) fn employee_names(conn: &Connection, org_id: &str) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT id, display_name FROM employees WHERE org_id=?1")
        .map_err(db_err("Prepare"))?;
    let names = stmt
        .query_map(params![org_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(db_err("Query names"))?
        .collect::<rusqlite::Result<HashMap<String, String>>>()
        .map_err(db_err("Read names"))?;
    Ok(names)
}

fn group_members(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT employee_id FROM employee_group_members WHERE group_id=?1 ORDER BY employee_id")
        .map_err(db_err("Prepare"))?;
    let ids = stmt
        .query_map(params![group_id], |row| row.get(0))
        .map_err(db_err("Query members"))?
        .collect::<rusqlite::Result<Vec<String>>>()
        .map_err(db_err("Read members"))?;
    Ok(ids)
}
