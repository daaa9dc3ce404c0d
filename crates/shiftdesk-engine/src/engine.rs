//! `ShiftEngine`: the operation set callers drive.
//!
//! Capability checks happen before these methods are called; the engine
//! trusts its caller on that and scopes every lookup by organization instead.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shiftdesk_core::config::RulesConfig;
use shiftdesk_core::error::{Result, ShiftdeskError};
use shiftdesk_core::traits::{NotificationDispatcher, NotificationKind};
use shiftdesk_core::types::{
    Assignment, Interval, NewSlot, Schedule, ScheduleSettings, ScheduleVersion, Slot,
    SlotWithAssignments,
};
use shiftdesk_store::{BulkAssignOutcome, ShiftDb};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task;

use crate::conflicts::{ConflictAnalyzer, ConflictReport, StaffingWarning, staffing_warnings};
use crate::diff::{PublishDiff, compute_diff};
use crate::notifier::{ChangeNotifier, NotifyReport, changed_members};

/// An assignment as the caller knows it.
///
/// `Pending` entries exist only on the caller's side (optimistic UI staging)
/// and are never sent to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum AssignmentRef {
    Pending(String),
    Persisted(String),
}

/// Result of a publish, returned instead of broadcasting a refresh event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub schedule_id: String,
    pub version: u32,
    pub diff: PublishDiff,
    pub notifications: NotifyReport,
    /// Advisory; never blocks the publish.
    pub staffing: Vec<StaffingWarning>,
}

pub struct ShiftEngine {
    db: Arc<ShiftDb>,
    notifier: ChangeNotifier,
    analyzer: ConflictAnalyzer,
}

impl ShiftEngine {
    pub fn new(
        db: Arc<ShiftDb>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        rules: &RulesConfig,
    ) -> Self {
        Self {
            db,
            notifier: ChangeNotifier::new(dispatcher),
            analyzer: ConflictAnalyzer::new(rules),
        }
    }

    pub fn db(&self) -> &Arc<ShiftDb> {
        &self.db
    }

    // ── Schedules & slots ──────────────────────────────────

    pub fn create_schedule(
        &self,
        org_id: &str,
        week_start: NaiveDate,
        name: Option<&str>,
        settings: ScheduleSettings,
    ) -> Result<Schedule> {
        self.db.create_schedule(org_id, week_start, name, settings)
    }

    pub fn create_slot(&self, org_id: &str, slot: &NewSlot) -> Result<Slot> {
        self.db.create_slot(org_id, slot)
    }

    pub fn assign_employee(
        &self,
        org_id: &str,
        slot_id: &str,
        employee_id: &str,
        slot_index: Option<u32>,
    ) -> Result<Assignment> {
        self.db.assign_employee(org_id, slot_id, employee_id, slot_index)
    }

    pub fn bulk_assign(
        &self,
        org_id: &str,
        schedule_id: &str,
        employee_ids: &[String],
        interval: Interval,
        position: Option<&str>,
    ) -> Result<BulkAssignOutcome> {
        self.db
            .bulk_assign(org_id, schedule_id, employee_ids, interval, position)
    }

    /// Bulk-assign every member of an employee group.
    pub fn bulk_assign_group(
        &self,
        org_id: &str,
        schedule_id: &str,
        group_id: &str,
        interval: Interval,
        position: Option<&str>,
    ) -> Result<BulkAssignOutcome> {
        let mut members: Vec<String> = self
            .db
            .group_member_ids(org_id, &[group_id.to_string()])?
            .into_iter()
            .collect();
        members.sort();
        self.db
            .bulk_assign(org_id, schedule_id, &members, interval, position)
    }

    pub fn move_slot(
        &self,
        org_id: &str,
        slot_id: &str,
        interval: Interval,
        employee_id: Option<&str>,
    ) -> Result<SlotWithAssignments> {
        self.db.move_slot(org_id, slot_id, interval, employee_id)
    }

    /// Remove an assignment. Pending refs are a pure client-side rollback.
    pub fn remove_assignment(&self, org_id: &str, assignment: &AssignmentRef) -> Result<bool> {
        match assignment {
            AssignmentRef::Pending(temp_id) => {
                tracing::debug!("Pending assignment {temp_id} discarded without a store call");
                Ok(false)
            }
            AssignmentRef::Persisted(id) => self.db.remove_assignment(org_id, id),
        }
    }

    // ── Lifecycle ──────────────────────────────────────────

    /// Snapshot, diff and flip to PUBLISHED in one transaction, then notify.
    ///
    /// Publishing an already-published schedule is allowed and yields a new
    /// version diffed against the previous one. The transaction runs on the
    /// blocking pool since it may wait up to `busy_timeout_ms` for the write lock.
    pub async fn publish(&self, org_id: &str, schedule_id: &str) -> Result<PublishOutcome> {
        let db = self.db.clone();
        let (org_id_owned, schedule_id_owned) = (org_id.to_string(), schedule_id.to_string());
        let (version, (diff, changes, staffing, schedule)) = task::spawn_blocking(move || {
            db.publish(&org_id_owned, &schedule_id_owned, |state| {
                let baseline = state.baseline();
                let diff = compute_diff(
                    &baseline,
                    &state.current,
                    &state.employee_names,
                    state.is_first_publish(),
                );
                let changes = changed_members(&baseline, &state.current);
                Ok((diff, changes, staffing_warnings(&state.slots), state.schedule.clone()))
            })
        })
        .await
        .map_err(|e| ShiftdeskError::Database(format!("Publish task: {e}")))??;

        if !staffing.is_empty() {
            tracing::info!(
                "📋 Published v{} with {} staffing warning(s)",
                version.version,
                staffing.len()
            );
        }

        let kind = if diff.is_first_publish {
            NotificationKind::SchedulePublished
        } else {
            NotificationKind::ScheduleChanged
        };
        let notifications = self
            .notifier
            .deliver(&self.db, &schedule, version.version, kind, &changes)
            .await;

        Ok(PublishOutcome {
            schedule_id: version.schedule_id,
            version: version.version,
            diff,
            notifications,
            staffing,
        })
    }

    /// What a publish would report right now, without committing anything.
    pub fn publish_diff(&self, org_id: &str, schedule_id: &str) -> Result<PublishDiff> {
        let state = self.db.publish_preview(org_id, schedule_id)?;
        Ok(compute_diff(
            &state.baseline(),
            &state.current,
            &state.employee_names,
            state.is_first_publish(),
        ))
    }

    pub fn list_versions(&self, org_id: &str, schedule_id: &str) -> Result<Vec<ScheduleVersion>> {
        self.db.list_versions(org_id, schedule_id)
    }

    // ── Analysis ───────────────────────────────────────────

    /// Overtime, availability and staffing flags for the schedule's current rows.
    pub fn analyze_conflicts(&self, org_id: &str, schedule_id: &str) -> Result<ConflictReport> {
        let slots = self.db.slots_with_assignments(org_id, schedule_id)?;
        let employees: HashMap<_, _> = self
            .db
            .list_employees(org_id, false)?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        Ok(self.analyzer.analyze(&slots, &employees))
    }
}
