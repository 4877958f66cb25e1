//! Nearest-safe-zone resolution.
//!
//! This module provides the `SafeZoneRegistry`, a copy-on-write set of
//! candidate safe locations ranked by great-circle distance, plus loading
//! of JSON catalogs. The Dhaka catalog bundled with the app is available
//! through `bundled_zones()`.

pub mod catalog;
pub mod registry;

pub use catalog::parse_catalog;
pub use registry::{SafeZoneRegistry, TIE_EPSILON_KM};

use anyhow::Result;

use crate::models::SafeZone;

/// Catalog shipped with the app
const BUNDLED_CATALOG: &str = include_str!("../../data/safe_zones.json");

pub fn bundled_zones() -> Result<Vec<SafeZone>> {
    parse_catalog(BUNDLED_CATALOG)
}
