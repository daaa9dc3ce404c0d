//! # Shiftdesk Store
//!
//! SQLite persistence for schedules, slots, assignments and published versions.
//!
//! Every mutation runs in a `BEGIN IMMEDIATE` transaction: SQLite hands out the
//! write lock at `BEGIN`, so two writers (threads with their own connection, or
//! separate service instances on the same file) are serialised and the overlap
//! check always sees the rows it guards.
//!
//! ```text
//! organizations ─┬─ employees ── employee_leaves
//!                ├─ employee_groups ── employee_group_members
//!                └─ schedules ─┬─ slots ── slot_assignments
//!                              ├─ schedule_versions (immutable snapshots)
//!                              └─ notifications (delivery log)
//! ```

mod assignments;
mod db;
mod directory;
mod notifications;
mod outcome;
mod schedules;
mod versions;

pub use db::ShiftDb;
pub use notifications::{NotificationRecord, NotificationStatus};
pub use outcome::{BulkAssignOutcome, BulkSkip, SkipReason};
pub use versions::PublishState;
