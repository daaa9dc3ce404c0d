//! Frozen slot state captured at publish time.
//!
//! Stored as JSON, read back through [`VersionSnapshot::from_json`] which rejects
//! unknown fields, unknown schema numbers and inverted intervals.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::interval::Interval;
use super::schedule::SlotWithAssignments;
use crate::error::{Result, ShiftdeskError};

pub const SNAPSHOT_SCHEMA: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SnapshotAssignment {
    pub employee_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SlotSnapshot {
    pub assignments: Vec<SnapshotAssignment>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub position: Option<String>,
}

impl SlotSnapshot {
    pub fn from_slot(slot: &SlotWithAssignments) -> Self {
        Self {
            assignments: slot
                .assignments
                .iter()
                .map(|a| SnapshotAssignment {
                    employee_id: a.employee_id.clone(),
                })
                .collect(),
            start_time: slot.slot.interval.start,
            end_time: slot.slot.interval.end,
            position: slot.slot.position.clone(),
        }
    }

    /// Employee in the lowest `slot_index`, if any.
    pub fn first_employee(&self) -> Option<&str> {
        self.assignments.first().map(|a| a.employee_id.as_str())
    }

    pub fn employee_ids(&self) -> BTreeSet<&str> {
        self.assignments.iter().map(|a| a.employee_id.as_str()).collect()
    }

    pub fn interval(&self) -> Interval {
        Interval {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// `None` and `""` compare equal.
    pub fn normalized_position(&self) -> &str {
        self.position.as_deref().unwrap_or("")
    }
}

/// slot id → frozen slot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VersionSnapshot {
    pub schema: u32,
    pub slots: BTreeMap<String, SlotSnapshot>,
}

impl Default for VersionSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl VersionSnapshot {
    pub fn empty() -> Self {
        Self {
            schema: SNAPSHOT_SCHEMA,
            slots: BTreeMap::new(),
        }
    }

    pub fn from_slots(slots: &[SlotWithAssignments]) -> Self {
        Self {
            schema: SNAPSHOT_SCHEMA,
            slots: slots
                .iter()
                .map(|s| (s.slot.id.clone(), SlotSnapshot::from_slot(s)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a stored snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| ShiftdeskError::Database(format!("corrupt version snapshot: {e}")))?;
        if snapshot.schema != SNAPSHOT_SCHEMA {
            return Err(ShiftdeskError::Database(format!(
                "unsupported snapshot schema {}",
                snapshot.schema
            )));
        }
        if let Some((id, _)) = snapshot
            .slots
            .iter()
            .find(|(_, s)| s.start_time >= s.end_time)
        {
            return Err(ShiftdeskError::Database(format!(
                "snapshot slot {id} has an inverted interval"
            )));
        }
        Ok(snapshot)
    }
}

/// Immutable record written on each successful publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleVersion {
    pub schedule_id: String,
    pub version: u32,
    pub snapshot: VersionSnapshot,
    pub created_at: DateTime<Utc>,
}
