//! Domain types for schedules, slots, assignments and versions.

mod employee;
mod interval;
mod schedule;
mod snapshot;

pub use employee::{
    weekday_key, AvailabilityTemplate, Employee, EmployeeGroup, LeaveInterval, LeaveKind,
    Organization,
};
pub use interval::{parse_datetime, Interval, DATETIME_FORMAT};
pub use schedule::{
    derive_schedule_name, Assignment, NewSlot, Schedule, ScheduleSettings, ScheduleStatus, Slot,
    SlotCounts, SlotWithAssignments,
};
pub use snapshot::{
    ScheduleVersion, SlotSnapshot, SnapshotAssignment, VersionSnapshot, SNAPSHOT_SCHEMA,
};

/// Generate a new opaque entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
