//! Data models for the HERGuard core.
//!
//! This module contains the value types shared by every component:
//!
//! - `SafeZone`, `ZoneCategory`, `SafetyLevel`: cataloged safe locations
//! - `Guardian`, `Channel`, `GuardianStatus`: trusted contacts and how to reach them
//! - `Alert`, `DeliveryAttempt`, `DispatchReport`: one SOS episode and its delivery trail

pub mod alert;
pub mod guardian;
pub mod zone;

pub use alert::{Alert, DeliveryAttempt, DeliveryOutcome, DispatchReport, Severity, ZoneSuggestion};
pub use guardian::{Channel, Guardian, GuardianStatus, Relationship};
pub use zone::{SafeZone, SafetyLevel, ZoneCategory};
