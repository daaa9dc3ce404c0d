//! # Shiftdesk Core
//!
//! Shared vocabulary for the shift-scheduling engine: domain types, the error
//! taxonomy, configuration, and the traits external collaborators implement
//! (capability checks, availability/leave lookups, text generation, notification
//! delivery).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::ShiftdeskConfig;
pub use error::{Result, ShiftdeskError};
