//! Change notifier bridge.
//!
//! Works from per-slot employee-id *sets*, not the display diff: an employee
//! is told about a publish only if some slot gained or lost them. Occupants of
//! untouched slots, and slots that only moved in time, trigger nothing.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shiftdesk_core::traits::{NotificationDispatcher, NotificationKind};
use shiftdesk_core::types::{Schedule, VersionSnapshot};
use shiftdesk_store::{NotificationRecord, NotificationStatus, ShiftDb};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Slots an employee gained or lost between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberChange {
    pub employee_id: String,
    pub added_slots: Vec<String>,
    pub removed_slots: Vec<String>,
}

/// Employees whose per-slot membership differs, ordered by employee id.
pub fn changed_members(previous: &VersionSnapshot, current: &VersionSnapshot) -> Vec<MemberChange> {
    let empty = BTreeSet::new();
    let slot_ids: BTreeSet<&String> = previous.slots.keys().chain(current.slots.keys()).collect();
    let mut changes: BTreeMap<&str, MemberChange> = BTreeMap::new();

    for slot_id in slot_ids {
        let before = previous.slots.get(slot_id).map(|s| s.employee_ids());
        let after = current.slots.get(slot_id).map(|s| s.employee_ids());
        let before = before.as_ref().unwrap_or(&empty);
        let after = after.as_ref().unwrap_or(&empty);

        for employee in after.difference(before) {
            entry(&mut changes, *employee).added_slots.push(slot_id.clone());
        }
        for employee in before.difference(after) {
            entry(&mut changes, *employee).removed_slots.push(slot_id.clone());
        }
    }
    changes.into_values().collect()
}

fn entry<'m, 'a>(
    changes: &'m mut BTreeMap<&'a str, MemberChange>,
    employee: &'a str,
) -> &'m mut MemberChange {
    changes.entry(employee).or_insert_with(|| MemberChange {
        employee_id: employee.to_string(),
        ..Default::default()
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryFailure {
    pub employee_id: String,
    pub error: String,
}

/// What happened to each affected employee's notice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyReport {
    pub notified: Vec<String>,
    /// No linked user account; never retried.
    pub unreachable: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
}

impl NotifyReport {
    /// Every employee the publish affected, regardless of outcome.
    pub fn affected(&self) -> BTreeSet<&str> {
        self.notified
            .iter()
            .chain(self.unreachable.iter())
            .map(String::as_str)
            .chain(self.failed.iter().map(|f| f.employee_id.as_str()))
            .collect()
    }
}

pub struct ChangeNotifier {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl ChangeNotifier {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn channel(&self) -> &str {
        self.dispatcher.name()
    }

    /// Send one notice per changed employee, in id order.
    ///
    /// Delivery problems are logged, recorded and reported; they never turn
    /// into an error for the caller.
    pub async fn deliver(
        &self,
        db: &ShiftDb,
        schedule: &Schedule,
        version: u32,
        kind: NotificationKind,
        changes: &[MemberChange],
    ) -> NotifyReport {
        let mut report = NotifyReport::default();

        for change in changes {
            let payload = serde_json::json!({
                "schedule_id": schedule.id,
                "schedule_name": schedule.name,
                "week_start": schedule.week_start,
                "version": version,
                "added_slots": change.added_slots,
                "removed_slots": change.removed_slots,
            });

            let user_id = match db.get_employee(&schedule.org_id, &change.employee_id) {
                Ok(employee) => employee.user_id,
                Err(e) => {
                    tracing::warn!("⚠️ Cannot resolve employee {}: {e}", change.employee_id);
                    None
                }
            };

            let (status, error) = match &user_id {
                None => {
                    tracing::info!(
                        "📭 {} has no linked account, notice not sent",
                        change.employee_id
                    );
                    report.unreachable.push(change.employee_id.clone());
                    (NotificationStatus::Unreachable, None)
                }
                Some(user) => match self.dispatcher.notify(user, kind, payload.clone()).await {
                    Ok(()) => {
                        report.notified.push(change.employee_id.clone());
                        (NotificationStatus::Sent, None)
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️ Notification to {} via {} failed: {e}",
                            change.employee_id,
                            self.dispatcher.name()
                        );
                        report.failed.push(DeliveryFailure {
                            employee_id: change.employee_id.clone(),
                            error: e.to_string(),
                        });
                        (NotificationStatus::Failed, Some(e.to_string()))
                    }
                },
            };

            let record = NotificationRecord {
                schedule_id: schedule.id.clone(),
                version,
                employee_id: change.employee_id.clone(),
                user_id,
                kind: kind.as_str().to_string(),
                payload,
                channel: self.dispatcher.name().to_string(),
                status,
                error,
                created_at: Utc::now(),
            };
            if let Err(e) = db.record_notification(&record) {
                tracing::warn!("⚠️ Failed to record notification for {}: {e}", change.employee_id);
            }
        }

        tracing::info!(
            "🔔 Publish v{version} notices: {} sent, {} unreachable, {} failed",
            report.notified.len(),
            report.unreachable.len(),
            report.failed.len()
        );
        report
    }
}
