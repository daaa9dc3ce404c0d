//! Read-only access to employee availability and leave.

use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{AvailabilityTemplate, LeaveInterval};

/// Availability and leave are mutated elsewhere; the engine only reads them.
pub trait AvailabilityProvider: Send + Sync {
    fn availability(&self, org_id: &str, employee_id: &str) -> Result<AvailabilityTemplate>;

    /// Leave intervals intersecting the inclusive range `[from, to]`.
    fn leaves(
        &self,
        org_id: &str,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LeaveInterval>>;

    fn on_leave(&self, org_id: &str, employee_id: &str, date: NaiveDate) -> Result<bool> {
        Ok(self
            .leaves(org_id, employee_id, date, date)?
            .iter()
            .any(|l| l.covers(date)))
    }
}
