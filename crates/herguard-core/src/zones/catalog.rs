//! JSON safe zone catalogs.
//!
//! Catalog files use the field names of the mobile app's bundled zone list
//! (`emergencyNumber`, `safetyLevel`, `is24Hours`, ...). Entries are converted
//! to `SafeZone` with coordinate validation.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::geo::GeoPoint;
use crate::models::{SafeZone, SafetyLevel, ZoneCategory};

use super::SafeZoneRegistry;

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    id: u32,
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    category: ZoneCategory,
    latitude: f64,
    longitude: f64,
    #[serde(rename = "emergencyNumber", default)]
    emergency_number: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "safetyLevel")]
    safety_level: SafetyLevel,
    #[serde(rename = "is24Hours", default)]
    is_24_hours: bool,
    #[serde(rename = "hasSecurity", default)]
    has_security: bool,
}

impl CatalogEntry {
    fn into_zone(self) -> Result<SafeZone> {
        let location = GeoPoint::new(self.latitude, self.longitude)
            .with_context(|| format!("Invalid coordinates for safe zone {}", self.id))?;
        Ok(SafeZone {
            id: self.id,
            name: self.name,
            category: self.category,
            location,
            safety_level: self.safety_level,
            emergency_number: self.emergency_number.filter(|n| !n.is_empty()),
            kind: self.kind,
            description: self.description,
            is_24_hours: self.is_24_hours,
            has_security: self.has_security,
        })
    }
}

/// Parse a catalog document. Zone ids must be unique.
pub fn parse_catalog(json: &str) -> Result<Vec<SafeZone>> {
    let entries: Vec<CatalogEntry> =
        serde_json::from_str(json).context("Failed to parse safe zone catalog")?;

    let mut seen = HashSet::new();
    let mut zones = Vec::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.id) {
            bail!("Duplicate safe zone id {} in catalog", entry.id);
        }
        zones.push(entry.into_zone()?);
    }
    Ok(zones)
}

impl SafeZoneRegistry {
    /// Replace the zone set with the contents of a catalog file.
    /// On error the current set is left in place.
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read safe zone catalog: {}", path.display()))?;
        let zones = parse_catalog(&contents)?;
        let count = zones.len();
        self.load(zones);
        debug!(path = %path.display(), count, "Loaded safe zone catalog");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 1, "name": "Dhaka Metropolitan Police Headquarter", "type": "Police Station",
         "category": "emergency", "latitude": 23.8103, "longitude": 90.4125,
         "emergencyNumber": "999", "description": "24/7 police assistance", "safetyLevel": "very_high"},
        {"id": 10, "name": "DBL Tower ATM Zone", "type": "ATM Center", "category": "financial",
         "latitude": 23.7991, "longitude": 90.4217, "emergencyNumber": null,
         "safetyLevel": "medium", "hasSecurity": true}
    ]"#;

    #[test]
    fn test_parse_catalog() {
        let zones = parse_catalog(SAMPLE).expect("sample parses");
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].category, ZoneCategory::Police);
        assert_eq!(zones[0].safety_level, SafetyLevel::VeryHigh);
        assert_eq!(zones[0].emergency_number.as_deref(), Some("999"));
        assert_eq!(zones[0].kind.as_deref(), Some("Police Station"));
        assert_eq!(zones[1].emergency_number, None);
        assert!(zones[1].has_security);
        assert!(!zones[1].is_24_hours);
    }

    #[test]
    fn test_parse_rejects_duplicates() {
        let json = r#"[
            {"id": 1, "name": "A", "category": "medical", "latitude": 1.0, "longitude": 1.0, "safetyLevel": "high"},
            {"id": 1, "name": "B", "category": "medical", "latitude": 2.0, "longitude": 2.0, "safetyLevel": "high"}
        ]"#;
        let err = parse_catalog(json).expect_err("duplicate ids rejected");
        assert!(err.to_string().contains("Duplicate safe zone id 1"));
    }

    #[test]
    fn test_parse_rejects_bad_coordinates() {
        let json = r#"[{"id": 5, "name": "A", "category": "medical", "latitude": 123.0,
                        "longitude": 1.0, "safetyLevel": "high"}]"#;
        assert!(parse_catalog(json).is_err());
    }

    #[test]
    fn test_failed_load_keeps_current_set() {
        let registry = SafeZoneRegistry::with_zones(parse_catalog(SAMPLE).expect("sample parses"));
        let missing = std::env::temp_dir().join(format!("herguard-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(registry.load_from_file(&missing).is_err());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("herguard-zones-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, SAMPLE).expect("write sample");

        let registry = SafeZoneRegistry::new();
        let count = registry.load_from_file(&path).expect("loads");
        assert_eq!(count, 2);
        assert_eq!(registry.len(), 2);

        let _ = std::fs::remove_file(&path);
    }
}
