//! Seams to external collaborators.

pub mod availability;
pub mod capability;
pub mod generator;
pub mod notify;

pub use availability::AvailabilityProvider;
pub use capability::{Actor, Capability, CapabilityCheck, StaticCapabilities};
pub use generator::TextGenerator;
pub use notify::{NotificationDispatcher, NotificationKind};
