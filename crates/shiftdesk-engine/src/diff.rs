//! Publish diff: what changed since the last published version.
//!
//! Display-oriented: each item carries the denormalized date, time range,
//! position and first occupant's name so a caller can render a summary without
//! further lookups. The authoritative "who to notify" set is computed
//! separately in [`crate::notifier`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shiftdesk_core::types::{SlotSnapshot, VersionSnapshot};
use std::collections::HashMap;

/// One slot's display data at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotView {
    pub date: NaiveDate,
    pub time_range: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub employee_name: Option<String>,
}

impl SlotView {
    fn of(snapshot: &SlotSnapshot, names: &HashMap<String, String>) -> Self {
        let interval = snapshot.interval();
        let employee_id = snapshot.first_employee().map(str::to_string);
        let employee_name = employee_id
            .as_ref()
            .map(|id| names.get(id).cloned().unwrap_or_else(|| id.clone()));
        Self {
            date: interval.date(),
            time_range: interval.time_range_label(),
            position: snapshot
                .position
                .clone()
                .filter(|p| !p.is_empty()),
            employee_id,
            employee_name,
        }
    }

    fn line(&self) -> String {
        let who = self.employee_name.as_deref().unwrap_or("unassigned");
        match &self.position {
            Some(p) => format!("{} {} {} ({})", self.date.format("%a %b %d"), self.time_range, who, p),
            None => format!("{} {} {}", self.date.format("%a %b %d"), self.time_range, who),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffItem {
    pub slot_id: String,
    #[serde(flatten)]
    pub view: SlotView,
    /// Prior values; set on changed items only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<SlotView>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub added_count: usize,
    pub removed_count: usize,
    pub changed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishDiff {
    pub is_first_publish: bool,
    pub added: Vec<DiffItem>,
    pub removed: Vec<DiffItem>,
    pub changed: Vec<DiffItem>,
    pub summary: DiffSummary,
}

impl PublishDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Human-readable lines, one per item.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.added.len() + self.removed.len() + self.changed.len());
        lines.extend(self.added.iter().map(|i| format!("+ {}", i.view.line())));
        lines.extend(self.removed.iter().map(|i| format!("- {}", i.view.line())));
        for item in &self.changed {
            match &item.previous {
                Some(prev) => lines.push(format!("~ {} → {}", prev.line(), item.view.line())),
                None => lines.push(format!("~ {}", item.view.line())),
            }
        }
        lines
    }
}

/// Whether a slot present in both snapshots counts as changed: different first
/// occupant, different start or end, or different position (`None` == `""`).
pub fn slot_changed(previous: &SlotSnapshot, current: &SlotSnapshot) -> bool {
    previous.first_employee() != current.first_employee()
        || previous.start_time != current.start_time
        || previous.end_time != current.end_time
        || previous.normalized_position() != current.normalized_position()
}

/// Compare two snapshots. Pure; `names` maps employee ids to display names.
pub fn compute_diff(
    previous: &VersionSnapshot,
    current: &VersionSnapshot,
    names: &HashMap<String, String>,
    is_first_publish: bool,
) -> PublishDiff {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();

    for (id, cur) in &current.slots {
        match previous.slots.get(id) {
            None => added.push((cur.start_time, item(id, cur, None, names))),
            Some(prev) if slot_changed(prev, cur) => {
                changed.push((cur.start_time, item(id, cur, Some(prev), names)))
            }
            Some(_) => {}
        }
    }
    for (id, prev) in &previous.slots {
        if !current.slots.contains_key(id) {
            removed.push((prev.start_time, item(id, prev, None, names)));
        }
    }

    let added = chronological(added);
    let removed = chronological(removed);
    let changed = chronological(changed);
    let summary = DiffSummary {
        added_count: added.len(),
        removed_count: removed.len(),
        changed_count: changed.len(),
    };
    PublishDiff {
        is_first_publish,
        added,
        removed,
        changed,
        summary,
    }
}

fn item(
    id: &str,
    snapshot: &SlotSnapshot,
    previous: Option<&SlotSnapshot>,
    names: &HashMap<String, String>,
) -> DiffItem {
    DiffItem {
        slot_id: id.to_string(),
        view: SlotView::of(snapshot, names),
        previous: previous.map(|p| SlotView::of(p, names)),
    }
}

/// Order by start time; slot id breaks ties (input is already id-ordered).
fn chronological<K: Ord>(mut items: Vec<(K, DiffItem)>) -> Vec<DiffItem> {
    items.sort_by(|a, b| a.0.cmp(&b.0));
    items.into_iter().map(|(_, item)| item).collect()
}
