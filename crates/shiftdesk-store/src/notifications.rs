//! Delivery log for publish notifications.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use shiftdesk_core::error::Result;

use crate::db::{ShiftDb, col_json, col_utc, db_err, load_schedule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Sent,
    Failed,
    /// No linked user account to deliver to.
    Unreachable,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Unreachable => "unreachable",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "sent" => Self::Sent,
            "unreachable" => Self::Unreachable,
            _ => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub schedule_id: String,
    pub version: u32,
    pub employee_id: String,
    pub user_id: Option<String>,
    pub kind: String,
    pub payload: serde_json::Value,
    /// Dispatcher name.
    pub channel: String,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ShiftDb {
    pub fn record_notification(&self, record: &NotificationRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications (schedule_id, version, employee_id, user_id, kind, payload, channel, status, error, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                record.schedule_id,
                record.version,
                record.employee_id,
                record.user_id,
                record.kind,
                payload,
                record.channel,
                record.status.as_str(),
                record.error,
                record.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err("Insert notification"))?;
        Ok(())
    }

    /// Newest first, across the organization's schedules.
    pub fn recent_notifications(&self, org_id: &str, limit: usize) -> Result<Vec<NotificationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "{NOTIFICATION_SELECT} WHERE sc.org_id=?1 ORDER BY n.id DESC LIMIT ?2"
            ))
            .map_err(db_err("Prepare"))?;
        let rows = stmt
            .query_map(params![org_id, limit as i64], row_to_notification)
            .map_err(db_err("Query notifications"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read notifications"))?;
        Ok(rows)
    }

    /// Notifications sent for one published version, in delivery order.
    pub fn notifications_for_version(
        &self,
        org_id: &str,
        schedule_id: &str,
        version: u32,
    ) -> Result<Vec<NotificationRecord>> {
        let conn = self.lock()?;
        load_schedule(&conn, org_id, schedule_id)?;
        let mut stmt = conn
            .prepare(&format!(
                "{NOTIFICATION_SELECT} WHERE n.schedule_id=?1 AND n.version=?2 ORDER BY n.id"
            ))
            .map_err(db_err("Prepare"))?;
        let rows = stmt
            .query_map(params![schedule_id, version], row_to_notification)
            .map_err(db_err("Query notifications"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Read notifications"))?;
        Ok(rows)
    }
}

const NOTIFICATION_SELECT: &str = "SELECT n.schedule_id, n.version, n.employee_id, n.user_id, n.kind, n.payload,
        n.channel, n.status, n.error, n.created_at
 FROM notifications n JOIN schedules sc ON sc.id = n.schedule_id";

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<NotificationRecord> {
    Ok(NotificationRecord {
        schedule_id: row.get(0)?,
        version: row.get(1)?,
        employee_id: row.get(2)?,
        user_id: row.get(3)?,
        kind: row.get(4)?,
        payload: col_json(row, 5)?,
        channel: row.get(6)?,
        status: NotificationStatus::parse(&row.get::<_, String>(7)?),
        error: row.get(8)?,
        created_at: col_utc(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shiftdesk_core::types::{Organization, ScheduleSettings};
    use std::path::PathBuf;

    #[test]
    fn test_record_and_list() {
        let db = ShiftDb::open(&PathBuf::from(":memory:")).unwrap();
        db.upsert_organization(&Organization {
            id: "org-a".into(),
            name: "Acme".into(),
        })
        .unwrap();
        let schedule = db
            .create_schedule(
                "org-a",
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                None,
                ScheduleSettings::default(),
            )
            .unwrap();

        for (employee, status) in [
            ("e1", NotificationStatus::Sent),
            ("e2", NotificationStatus::Unreachable),
        ] {
            db.record_notification(&NotificationRecord {
                schedule_id: schedule.id.clone(),
                version: 1,
                employee_id: employee.into(),
                user_id: None,
                kind: "schedule_published".into(),
                payload: serde_json::json!({"added": ["s1"]}),
                channel: "log".into(),
                status,
                error: None,
                created_at: Utc::now(),
            })
            .unwrap();
        }

        let recent = db.recent_notifications("org-a", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].employee_id, "e2");
        assert_eq!(recent[0].status, NotificationStatus::Unreachable);
        assert!(db.recent_notifications("org-b", 10).unwrap().is_empty());

        let v1 = db.notifications_for_version("org-a", &schedule.id, 1).unwrap();
        assert_eq!(v1[0].employee_id, "e1");
        assert_eq!(v1[0].payload["added"][0], "s1");
    }
}
