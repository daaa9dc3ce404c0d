//! Roster import: organization, employees, groups and leave from one JSON file.
//!
//! ```json
//! {
//!   "organization": { "id": "acme", "name": "Acme Café" },
//!   "employees": [
//!     { "id": "e1", "display_name": "Ana", "user_id": "u-ana", "role": "barista",
//!       "availability": { "monday": ["09:00", "10:00"] } }
//!   ],
//!   "groups": [ { "id": "g-bar", "name": "Bar", "employee_ids": ["e1"] } ],
//!   "leaves": [ { "employee_id": "e1", "start_date": "2024-06-12",
//!                 "end_date": "2024-06-14", "kind": "vacation" } ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use shiftdesk_core::error::Result;
use shiftdesk_core::types::{
    AvailabilityTemplate, Employee, EmployeeGroup, LeaveInterval, Organization,
};
use shiftdesk_store::ShiftDb;

#[derive(Debug, Deserialize)]
pub struct Roster {
    pub organization: Organization,
    #[serde(default)]
    pub employees: Vec<RosterEmployee>,
    #[serde(default)]
    pub groups: Vec<RosterGroup>,
    #[serde(default)]
    pub leaves: Vec<LeaveInterval>,
}

#[derive(Debug, Deserialize)]
pub struct RosterEmployee {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default = "default_weekly_hours")]
    pub default_weekly_hours: f64,
    #[serde(default)]
    pub availability: AvailabilityTemplate,
    #[serde(default = "bool_true")]
    pub active: bool,
}

fn default_weekly_hours() -> f64 {
    40.0
}

fn bool_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RosterGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub employee_ids: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportSummary {
    pub organization: String,
    pub employees: usize,
    pub groups: usize,
    pub leaves: usize,
}

impl Roster {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Upsert everything in dependency order: org, employees, groups, leave.
    pub fn import(self, db: &ShiftDb) -> Result<ImportSummary> {
        let org_id = self.organization.id.clone();
        db.upsert_organization(&self.organization)?;

        let mut summary = ImportSummary {
            organization: org_id.clone(),
            ..Default::default()
        };
        for e in self.employees {
            db.upsert_employee(&Employee {
                id: e.id,
                org_id: org_id.clone(),
                user_id: e.user_id,
                display_name: e.display_name,
                role: e.role,
                default_weekly_hours: e.default_weekly_hours,
                availability: e.availability,
                active: e.active,
            })?;
            summary.employees += 1;
        }
        for g in self.groups {
            db.upsert_group(&EmployeeGroup {
                id: g.id,
                org_id: org_id.clone(),
                name: g.name,
                employee_ids: g.employee_ids,
            })?;
            summary.groups += 1;
        }
        for leave in &self.leaves {
            db.add_leave(&org_id, leave)?;
            summary.leaves += 1;
        }

        tracing::info!(
            "📥 Imported roster for {org_id}: {} employees, {} groups, {} leave entries",
            summary.employees,
            summary.groups,
            summary.leaves
        );
        Ok(summary)
    }
}
