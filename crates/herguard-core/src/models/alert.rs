//! Alert, delivery attempt, and dispatch report types.
//!
//! These are the JSON shapes written to the audit trail and handed to the UI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::{Channel, SafeZone};
use crate::utils::format_distance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Severity {
    Test,
    Real,
}

/// Nearest safe zone and how far away it was when the alert was built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ZoneSuggestion {
    pub zone: SafeZone,
    pub distance_km: f64,
}

/// One alert per SOS episode. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Alert {
    pub id: Uuid,
    pub triggered_at: DateTime<Utc>,
    /// Absent when location sharing is off or the lookup failed
    pub location: Option<GeoPoint>,
    pub nearest_safe_zone: Option<ZoneSuggestion>,
    pub evidence_mode_requested: bool,
    pub severity: Severity,
}

impl Alert {
    pub fn new(
        severity: Severity,
        location: Option<GeoPoint>,
        nearest_safe_zone: Option<ZoneSuggestion>,
        evidence_mode_requested: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            triggered_at: Utc::now(),
            location,
            nearest_safe_zone,
            evidence_mode_requested,
            severity,
        }
    }

    pub fn is_test(&self) -> bool {
        self.severity == Severity::Test
    }

    /// Text body sent over SMS/push and read out by voice calls
    pub fn message(&self) -> String {
        let mut lines = Vec::new();

        match self.severity {
            Severity::Real => lines.push("HERGuard EMERGENCY ALERT".to_string()),
            Severity::Test => {
                lines.push("HERGuard TEST ALERT - no action needed".to_string())
            }
        }

        match &self.location {
            Some(point) => {
                lines.push(format!("My current location: {}", point.maps_url()));
                lines.push(format!("Latitude: {}", point.latitude));
                lines.push(format!("Longitude: {}", point.longitude));
            }
            None => lines.push("Location unavailable".to_string()),
        }

        if let Some(ref suggestion) = self.nearest_safe_zone {
            let mut line = format!(
                "Nearest safe zone: {} ({})",
                suggestion.zone.name,
                format_distance(suggestion.distance_km)
            );
            if let Some(ref number) = suggestion.zone.emergency_number {
                line.push_str(&format!(" - call {}", number));
            }
            lines.push(line);
        }

        if self.evidence_mode_requested {
            lines.push("Evidence mode active: recording audio and capturing photos".to_string());
        }

        lines.push(format!("Time: {}", self.triggered_at.format("%Y-%m-%d %H:%M:%S UTC")));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum DeliveryOutcome {
    Pending,
    Delivered,
    Failed,
    TimedOut,
}

impl DeliveryOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryOutcome::Pending)
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Pending => write!(f, "Pending"),
            DeliveryOutcome::Delivered => write!(f, "Delivered"),
            DeliveryOutcome::Failed => write!(f, "Failed"),
            DeliveryOutcome::TimedOut => write!(f, "Timed Out"),
        }
    }
}

/// One append-only audit record per (guardian, channel, try).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DeliveryAttempt {
    pub alert_id: Uuid,
    pub guardian_id: String,
    pub channel: Channel,
    pub attempt_number: u32,
    pub outcome: DeliveryOutcome,
    pub timestamp: DateTime<Utc>,
    /// Failure reason, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct DispatchReport {
    pub alert_id: Uuid,
    /// Final outcome per guardian id: `Delivered` or `Failed`
    pub per_guardian: BTreeMap<String, DeliveryOutcome>,
    /// Channel that got through, per delivered guardian
    #[serde(default)]
    pub delivered_via: BTreeMap<String, Channel>,
    pub delivered_count: usize,
    pub failed_count: usize,
}

impl DispatchReport {
    pub fn new(alert_id: Uuid) -> Self {
        Self {
            alert_id,
            per_guardian: BTreeMap::new(),
            delivered_via: BTreeMap::new(),
            delivered_count: 0,
            failed_count: 0,
        }
    }

    /// Record a guardian's final outcome and keep the counters in step
    pub fn record(&mut self, guardian_id: &str, outcome: DeliveryOutcome, via: Option<Channel>) {
        if let Some(previous) = self.per_guardian.insert(guardian_id.to_string(), outcome) {
            match previous {
                DeliveryOutcome::Delivered => self.delivered_count -= 1,
                DeliveryOutcome::Failed | DeliveryOutcome::TimedOut => self.failed_count -= 1,
                DeliveryOutcome::Pending => {}
            }
        }
        match outcome {
            DeliveryOutcome::Delivered => {
                self.delivered_count += 1;
                if let Some(channel) = via {
                    self.delivered_via.insert(guardian_id.to_string(), channel);
                }
            }
            DeliveryOutcome::Failed | DeliveryOutcome::TimedOut => {
                self.failed_count += 1;
                self.delivered_via.remove(guardian_id);
            }
            DeliveryOutcome::Pending => {}
        }
    }

    pub fn outcome_for(&self, guardian_id: &str) -> Option<DeliveryOutcome> {
        self.per_guardian.get(guardian_id).copied()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed_count == 0 && self.delivered_count == self.per_guardian.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SafetyLevel, ZoneCategory};

    fn police_zone() -> SafeZone {
        let location = GeoPoint::new(23.8103, 90.4125).expect("valid coordinate");
        SafeZone::new(1, "Gulshan Police Station", ZoneCategory::Police, location, SafetyLevel::VeryHigh)
            .with_emergency_number("999")
    }

    // -------------------------------------------------------------------------
    // Alert Message Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_message_with_location_and_zone() {
        let location = GeoPoint::new(23.8, 90.41).expect("valid coordinate");
        let alert = Alert::new(
            Severity::Real,
            Some(location),
            Some(ZoneSuggestion {
                zone: police_zone(),
                distance_km: 0.54,
            }),
            true,
        );
        let msg = alert.message();
        assert!(msg.starts_with("HERGuard EMERGENCY ALERT"));
        assert!(msg.contains("https://maps.google.com/?q=23.8,90.41"));
        assert!(msg.contains("Nearest safe zone: Gulshan Police Station (0.5 km) - call 999"));
        assert!(msg.contains("Evidence mode active"));
    }

    #[test]
    fn test_message_without_location() {
        let alert = Alert::new(Severity::Test, None, None, false);
        let msg = alert.message();
        assert!(msg.starts_with("HERGuard TEST ALERT"));
        assert!(msg.contains("Location unavailable"));
        assert!(!msg.contains("Nearest safe zone"));
        assert!(!msg.contains("Evidence mode"));
    }

    #[test]
    fn test_alert_ids_are_unique() {
        let a = Alert::new(Severity::Real, None, None, false);
        let b = Alert::new(Severity::Real, None, None, false);
        assert_ne!(a.id, b.id);
    }

    // -------------------------------------------------------------------------
    // Dispatch Report Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_report_counters_follow_outcomes() {
        let mut report = DispatchReport::new(Uuid::new_v4());
        report.record("a", DeliveryOutcome::Pending, None);
        report.record("b", DeliveryOutcome::Pending, None);
        assert_eq!((report.delivered_count, report.failed_count), (0, 0));

        report.record("a", DeliveryOutcome::Delivered, Some(Channel::Push));
        report.record("b", DeliveryOutcome::Failed, None);
        assert_eq!((report.delivered_count, report.failed_count), (1, 1));
        assert_eq!(report.delivered_via.get("a"), Some(&Channel::Push));
        assert!(!report.all_delivered());
    }

    #[test]
    fn test_report_json_shape() {
        let mut report = DispatchReport::new(Uuid::nil());
        report.record("g1", DeliveryOutcome::Delivered, Some(Channel::Sms));
        let json = serde_json::to_value(&report).expect("serializes");
        assert_eq!(json["per_guardian"]["g1"], "delivered");
        assert_eq!(json["delivered_via"]["g1"], "sms");
        assert_eq!(json["delivered_count"], 1);
        assert_eq!(json["failed_count"], 0);
    }
}
