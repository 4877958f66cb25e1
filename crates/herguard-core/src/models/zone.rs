//! Safe zone domain types.

use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ZoneCategory {
    // Catalogs group police and fire stations as "emergency"
    #[serde(alias = "emergency")]
    Police,
    Medical,
    PublicSpace,
    Financial,
    Educational,
    Support,
    Accommodation,
    Transport,
    Commercial,
}

impl std::fmt::Display for ZoneCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoneCategory::Police => write!(f, "Police"),
            ZoneCategory::Medical => write!(f, "Medical"),
            ZoneCategory::PublicSpace => write!(f, "Public Space"),
            ZoneCategory::Financial => write!(f, "Financial"),
            ZoneCategory::Educational => write!(f, "Educational"),
            ZoneCategory::Support => write!(f, "Support"),
            ZoneCategory::Accommodation => write!(f, "Accommodation"),
            ZoneCategory::Transport => write!(f, "Transport"),
            ZoneCategory::Commercial => write!(f, "Commercial"),
        }
    }
}

impl std::str::FromStr for ZoneCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "police" | "emergency" => Ok(ZoneCategory::Police),
            "medical" => Ok(ZoneCategory::Medical),
            "public_space" => Ok(ZoneCategory::PublicSpace),
            "financial" => Ok(ZoneCategory::Financial),
            "educational" => Ok(ZoneCategory::Educational),
            "support" => Ok(ZoneCategory::Support),
            "accommodation" => Ok(ZoneCategory::Accommodation),
            "transport" => Ok(ZoneCategory::Transport),
            "commercial" => Ok(ZoneCategory::Commercial),
            other => Err(format!("unknown safe zone category: {}", other)),
        }
    }
}

/// How safe a zone is considered. Ordered so that `VeryHigh` is greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SafetyLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyLevel::Low => write!(f, "Low"),
            SafetyLevel::Medium => write!(f, "Medium"),
            SafetyLevel::High => write!(f, "High"),
            SafetyLevel::VeryHigh => write!(f, "Very High"),
        }
    }
}

/// A pre-cataloged safe location. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SafeZone {
    pub id: u32,
    pub name: String,
    pub category: ZoneCategory,
    pub location: GeoPoint,
    pub safety_level: SafetyLevel,
    pub emergency_number: Option<String>,
    /// Human label such as "Police Station" or "Pharmacy"
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_24_hours: bool,
    #[serde(default)]
    pub has_security: bool,
}

impl SafeZone {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        category: ZoneCategory,
        location: GeoPoint,
        safety_level: SafetyLevel,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category,
            location,
            safety_level,
            emergency_number: None,
            kind: None,
            description: None,
            is_24_hours: false,
            has_security: false,
        }
    }

    pub fn with_emergency_number(mut self, number: impl Into<String>) -> Self {
        self.emergency_number = Some(number.into());
        self
    }

    /// Label for display, falling back to the category name
    pub fn kind_display(&self) -> String {
        self.kind
            .clone()
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| self.category.to_string())
    }
}
