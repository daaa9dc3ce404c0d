//! Capability checks. Evaluated by callers before invoking mutating operations.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::AccessConfig;

/// Whoever is driving the call (user id, service name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor(pub String);

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageSchedule,
    EditSlots,
    Publish,
    Suggest,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageSchedule => "manage_schedule",
            Capability::EditSlots => "edit_slots",
            Capability::Publish => "publish",
            Capability::Suggest => "suggest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manage_schedule" => Some(Capability::ManageSchedule),
            "edit_slots" => Some(Capability::EditSlots),
            "publish" => Some(Capability::Publish),
            "suggest" => Some(Capability::Suggest),
            _ => None,
        }
    }
}

pub trait CapabilityCheck: Send + Sync {
    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool;
}

/// Grants loaded from the `[access]` config section.
pub struct StaticCapabilities {
    allow_all: bool,
    grants: HashMap<String, HashSet<Capability>>,
}

impl StaticCapabilities {
    pub fn from_config(config: &AccessConfig) -> Self {
        let grants = config
            .grants
            .iter()
            .map(|(actor, names)| {
                let caps = names
                    .iter()
                    .filter_map(|n| {
                        let cap = Capability::parse(n);
                        if cap.is_none() {
                            tracing::warn!("⚠️ Unknown capability '{n}' granted to {actor}");
                        }
                        cap
                    })
                    .collect();
                (actor.clone(), caps)
            })
            .collect();
        Self {
            allow_all: config.allow_all,
            grants,
        }
    }
}

impl CapabilityCheck for StaticCapabilities {
    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        self.allow_all
            || self
                .grants
                .get(&actor.0)
                .is_some_and(|caps| caps.contains(&capability))
    }
}
