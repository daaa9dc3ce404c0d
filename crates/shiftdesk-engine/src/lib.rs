//! # Shiftdesk Engine
//!
//! Schedule lifecycle on top of the slot store.
//!
//! ```text
//! ShiftEngine
//!   ├── slot writes ──────────→ ShiftDb (overlap check + insert, one transaction)
//!   ├── publish ──→ ShiftDb::publish
//!   │                 ├── diff::compute_diff       (display report)
//!   │                 ├── notifier::changed_members (who to tell)
//!   │                 └── conflicts::staffing_warnings
//!   │               └─→ ChangeNotifier → NotificationDispatcher
//!   │                                     ├── LogDispatcher
//!   │                                     └── WebhookDispatcher (HTTP POST)
//!   └── analyze_conflicts ──→ ConflictAnalyzer (overtime, availability, staffing)
//! ```
//!
//! Diffing and conflict analysis are pure functions over already-loaded rows;
//! only the store takes locks.

pub mod conflicts;
pub mod diff;
pub mod dispatch;
pub mod engine;
pub mod notifier;

pub use conflicts::{ConflictAnalyzer, ConflictReport, StaffingWarning};
pub use diff::{DiffItem, DiffSummary, PublishDiff};
pub use dispatch::{LogDispatcher, WebhookDispatcher, create_dispatcher};
pub use engine::{AssignmentRef, PublishOutcome, ShiftEngine};
pub use notifier::{ChangeNotifier, MemberChange, NotifyReport};
