//! Channel transports.
//!
//! A `ChannelTransport` delivers one alert to one guardian over one channel.
//! Real radio/SMS/push integrations live outside this crate; the built-in
//! implementations here are for drills and tests.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

use crate::error::SendError;
use crate::models::{Alert, Channel, Guardian};

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Deliver the alert. `Ok(())` means the channel confirmed delivery.
    async fn send(&self, guardian: &Guardian, channel: Channel, alert: &Alert) -> Result<(), SendError>;

    /// Returns the name of the transport, for logs.
    fn name(&self) -> &str;
}

/// Always delivers. Logs what a real transport would have sent.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    latency: Duration,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ChannelTransport for SimulatedTransport {
    async fn send(&self, guardian: &Guardian, channel: Channel, alert: &Alert) -> Result<(), SendError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        info!(
            alert_id = %alert.id,
            guardian_id = %guardian.id,
            phone = %guardian.masked_phone(),
            channel = %channel,
            "Alert delivered via simulated transport"
        );
        debug!(message = %alert.message(), "Simulated message body");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// Fails a configurable fraction of sends with `NoNetwork`, for offline drills.
#[derive(Debug, Clone)]
pub struct FlakyTransport {
    failure_rate: f64,
    latency: Duration,
}

impl FlakyTransport {
    /// `failure_rate` is clamped to [0, 1]
    pub fn new(failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            failure_rate,
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

#[async_trait]
impl ChannelTransport for FlakyTransport {
    async fn send(&self, guardian: &Guardian, channel: Channel, alert: &Alert) -> Result<(), SendError> {
        let fail = rand::thread_rng().gen_bool(self.failure_rate);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if fail {
            debug!(
                alert_id = %alert.id,
                guardian_id = %guardian.id,
                channel = %channel,
                "Flaky transport dropped the send"
            );
            return Err(SendError::NoNetwork);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Relationship, Severity};

    fn guardian() -> Guardian {
        Guardian::new("g1", "Mom", "+8801712345678", [Channel::Sms], Relationship::Family)
    }

    #[tokio::test]
    async fn test_simulated_always_delivers() {
        let transport = SimulatedTransport::new();
        let alert = Alert::new(Severity::Test, None, None, false);
        assert_eq!(transport.send(&guardian(), Channel::Sms, &alert).await, Ok(()));
        assert_eq!(transport.name(), "simulated");
    }

    #[tokio::test]
    async fn test_flaky_extremes() {
        let alert = Alert::new(Severity::Test, None, None, false);
        let never = FlakyTransport::new(0.0);
        let always = FlakyTransport::new(1.0);
        for _ in 0..20 {
            assert_eq!(never.send(&guardian(), Channel::Push, &alert).await, Ok(()));
            assert_eq!(
                always.send(&guardian(), Channel::Push, &alert).await,
                Err(SendError::NoNetwork)
            );
        }
    }

    #[test]
    fn test_flaky_rate_is_clamped() {
        assert_eq!(FlakyTransport::new(7.0).failure_rate(), 1.0);
        assert_eq!(FlakyTransport::new(-1.0).failure_rate(), 0.0);
        assert_eq!(FlakyTransport::new(f64::NAN).failure_rate(), 0.0);
    }
}
