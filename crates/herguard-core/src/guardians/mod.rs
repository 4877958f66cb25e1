//! Guardian list management.
//!
//! `GuardianRegistry` holds the user's trusted contacts with their channel
//! capabilities and status. Only `Active` guardians receive alerts.

pub mod registry;

pub use registry::GuardianRegistry;
