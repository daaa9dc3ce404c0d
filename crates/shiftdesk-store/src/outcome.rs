//! Result shapes for partially-successful store operations.

use serde::{Deserialize, Serialize};
use shiftdesk_core::types::{Assignment, Slot};

/// Why an employee was left out of a bulk assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Already occupies the target slot.
    AlreadyAssigned,
    /// Holds an intersecting assignment elsewhere in the schedule.
    Overlap { conflicting_slot_id: String },
    /// Unknown within the organization.
    NotFound,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSkip {
    pub employee_id: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of a bulk assignment: partial success is normal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAssignOutcome {
    /// `None` when every employee was skipped and no matching slot existed.
    pub slot: Option<Slot>,
    pub created: usize,
    pub assignments: Vec<Assignment>,
    pub skipped: Vec<BulkSkip>,
}
