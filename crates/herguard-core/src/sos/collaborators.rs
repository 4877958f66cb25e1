//! Device-side collaborators the controller calls into.

use async_trait::async_trait;
use tracing::debug;

use crate::error::LocationError;
use crate::geo::GeoPoint;

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<GeoPoint, LocationError>;
}

/// Fire-and-forget start/stop signals for audio/photo capture.
pub trait EvidenceCapture: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Always reports the same position
#[derive(Debug, Clone)]
pub struct FixedLocation {
    point: GeoPoint,
}

impl FixedLocation {
    pub fn new(point: GeoPoint) -> Self {
        Self { point }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<GeoPoint, LocationError> {
        Ok(GeoPoint {
            captured_at: chrono::Utc::now(),
            ..self.point
        })
    }
}

/// Always fails with the configured error
#[derive(Debug, Clone)]
pub struct FailingLocation {
    error: LocationError,
}

impl FailingLocation {
    pub fn new(error: LocationError) -> Self {
        Self { error }
    }
}

impl Default for FailingLocation {
    fn default() -> Self {
        Self::new(LocationError::Unavailable("no location provider configured".to_string()))
    }
}

#[async_trait]
impl LocationProvider for FailingLocation {
    async fn current_location(&self) -> Result<GeoPoint, LocationError> {
        Err(self.error.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvidenceCapture;

impl EvidenceCapture for NoopEvidenceCapture {
    fn start(&self) {
        debug!("Evidence capture start requested");
    }

    fn stop(&self) {
        debug!("Evidence capture stop requested");
    }
}
