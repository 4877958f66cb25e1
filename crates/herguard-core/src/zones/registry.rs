use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::geo::{distance_km, GeoPoint};
use crate::models::{SafeZone, ZoneCategory, ZoneSuggestion};

/// Distances closer than this are treated as ties and ordered by id.
pub const TIE_EPSILON_KM: f64 = 1e-6;

/// Candidate safe locations, answering nearest-K queries.
///
/// The zone set is replaced wholesale by `load`: readers take a snapshot of
/// the current `Arc` and rank against it, so a concurrent `load` is observed
/// either entirely or not at all.
#[derive(Debug, Default)]
pub struct SafeZoneRegistry {
    zones: RwLock<Arc<Vec<SafeZone>>>,
}

impl SafeZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zones(zones: Vec<SafeZone>) -> Self {
        Self {
            zones: RwLock::new(Arc::new(zones)),
        }
    }

    /// Replace the entire candidate set
    pub fn load(&self, zones: Vec<SafeZone>) {
        let next = Arc::new(zones);
        let count = next.len();
        let mut guard = self.zones.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
        debug!(count, "Safe zone registry reloaded");
    }

    /// Current zone set. Cheap: clones the `Arc`, not the zones.
    pub fn snapshot(&self) -> Arc<Vec<SafeZone>> {
        let guard = self.zones.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// The `k` closest zones, ascending by distance then id.
    /// An empty registry yields an empty list.
    pub fn nearest(&self, origin: &GeoPoint, k: usize) -> Vec<ZoneSuggestion> {
        let zones = self.snapshot();
        let mut ranked = rank(origin, zones.iter());
        ranked.truncate(k);
        ranked
    }

    /// Like `nearest`, restricted to the given categories
    pub fn nearest_in(
        &self,
        origin: &GeoPoint,
        k: usize,
        categories: &[ZoneCategory],
    ) -> Vec<ZoneSuggestion> {
        let zones = self.snapshot();
        let mut ranked = rank(
            origin,
            zones.iter().filter(|z| categories.contains(&z.category)),
        );
        ranked.truncate(k);
        ranked
    }

    /// Every zone within `radius_km` of the origin, closest first
    pub fn within(&self, origin: &GeoPoint, radius_km: f64) -> Vec<ZoneSuggestion> {
        let zones = self.snapshot();
        rank(origin, zones.iter())
            .into_iter()
            .take_while(|s| s.distance_km <= radius_km + TIE_EPSILON_KM)
            .collect()
    }
}

fn rank<'a>(origin: &GeoPoint, zones: impl Iterator<Item = &'a SafeZone>) -> Vec<ZoneSuggestion> {
    let mut ranked: Vec<ZoneSuggestion> = zones
        .map(|zone| ZoneSuggestion {
            distance_km: distance_km(origin, &zone.location),
            zone: zone.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        a.distance_km
            .total_cmp(&b.distance_km)
            .then_with(|| a.zone.id.cmp(&b.zone.id))
    });

    // Runs of near-equal distances are reordered by id. A run is measured from
    // its first entry so it never spans more than the epsilon.
    let mut start = 0;
    while start < ranked.len() {
        let mut end = start + 1;
        while end < ranked.len()
            && ranked[end].distance_km - ranked[start].distance_km <= TIE_EPSILON_KM
        {
            end += 1;
        }
        if end - start > 1 {
            ranked[start..end].sort_by_key(|s| s.zone.id);
        }
        start = end;
    }

    ranked
}
