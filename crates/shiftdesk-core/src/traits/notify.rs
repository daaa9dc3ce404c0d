//! Outbound notification delivery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// First publish of a schedule.
    SchedulePublished,
    /// Republish that touched the recipient's shifts.
    ScheduleChanged,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SchedulePublished => "schedule_published",
            NotificationKind::ScheduleChanged => "schedule_changed",
        }
    }
}

/// Fire-and-forget from the engine's perspective; delivery guarantees live here.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(
        &self,
        user_id: &str,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<()>;
}
