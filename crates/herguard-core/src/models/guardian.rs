//! Guardian domain types.
//!
//! Guardians are created by the user-management collaborator; the core only
//! reads them, except for the CRUD surface on `GuardianRegistry`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::utils::{format_phone, mask_phone};

/// Delivery channel. Declaration order is the fallback priority:
/// data connection first, then SMS, then a voice call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Channel {
    Push,
    Sms,
    Voice,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Push => write!(f, "Push"),
            Channel::Sms => write!(f, "SMS"),
            Channel::Voice => write!(f, "Voice"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Relationship {
    Family,
    Friend,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum GuardianStatus {
    Pending,
    Active,
    Revoked,
}

impl std::fmt::Display for GuardianStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardianStatus::Pending => write!(f, "Pending"),
            GuardianStatus::Active => write!(f, "Active"),
            GuardianStatus::Revoked => write!(f, "Revoked"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Guardian {
    pub id: String,
    pub name: String,
    pub phone_number: String,
    pub channels: BTreeSet<Channel>,
    pub relationship: Relationship,
    pub status: GuardianStatus,
}

impl Guardian {
    /// New guardians start out `Pending` until the registry activates them.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone_number: impl Into<String>,
        channels: impl IntoIterator<Item = Channel>,
        relationship: Relationship,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone_number: phone_number.into(),
            channels: channels.into_iter().collect(),
            relationship,
            status: GuardianStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: GuardianStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == GuardianStatus::Active
    }

    /// A guardian with no reachable channel cannot be activated
    pub fn can_activate(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Channels in delivery priority order
    pub fn channels_by_priority(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.iter().copied()
    }

    pub fn display_phone(&self) -> String {
        format_phone(&self.phone_number)
    }

    pub fn masked_phone(&self) -> String {
        mask_phone(&self.phone_number)
    }
}
