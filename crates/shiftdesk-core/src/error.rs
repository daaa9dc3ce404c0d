//! Error taxonomy shared by every Shiftdesk crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ShiftdeskError>;

#[derive(Debug, Error)]
pub enum ShiftdeskError {
    /// Malformed input: bad interval, missing field, out-of-range count.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The employee already holds an assignment whose interval intersects the target.
    #[error("Overlap conflict: employee {employee_id} is already booked on slot {conflicting_slot_id} (target slot {slot_id})")]
    OverlapConflict {
        employee_id: String,
        slot_id: String,
        conflicting_slot_id: String,
    },

    /// Id not resolvable within the caller's organization.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Suggestion generator unavailable, timed out, or returned garbage.
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ShiftdeskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: &str, id: &str) -> Self {
        Self::NotFound(format!("{what} '{id}'"))
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    /// Whether a caller may retry the operation as-is.
    ///
    /// Validation, overlap and not-found outcomes are final. Only a busy/locked
    /// database is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("locked") || msg.contains("busy")
            }
            _ => false,
        }
    }

    pub fn is_overlap(&self) -> bool {
        matches!(self, Self::OverlapConflict { .. })
    }
}
