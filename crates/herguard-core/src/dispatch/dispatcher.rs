//! Guardian notification fan-out.
//!
//! `NotificationDispatcher` delivers one alert to a set of guardians in
//! parallel. Per guardian, channels are tried in priority order (push, SMS,
//! voice), each channel with bounded retries and exponential backoff, all
//! under a hard per-guardian deadline. Transport failures are recorded on
//! the attempt log and never abort delivery to anyone else.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SendError;
use crate::models::{Alert, Channel, DeliveryAttempt, DeliveryOutcome, DispatchReport, Guardian};

use super::{AttemptLog, ChannelTransport, RetryPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Hard cap on total delivery time per guardian.
pub const DEFAULT_GUARDIAN_DEADLINE: Duration = Duration::from_secs(60);

/// A single send that has not completed after this long counts as a failed try.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    pub retry: RetryPolicy,
    pub guardian_deadline: Duration,
    pub attempt_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            guardian_deadline: DEFAULT_GUARDIAN_DEADLINE,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// The attempt currently awaiting a transport, if any
struct InFlight {
    channel: Channel,
    attempt: u32,
    abandoned: Arc<AtomicBool>,
}

enum AttemptResult {
    Delivered,
    Failed(String),
    TimedOut(String),
}

type GuardianResult = (String, DeliveryOutcome, Option<Channel>);

pub struct NotificationDispatcher {
    transports: HashMap<Channel, Arc<dyn ChannelTransport>>,
    settings: DispatchSettings,
    log: AttemptLog,
}

impl NotificationDispatcher {
    pub fn new(settings: DispatchSettings) -> Self {
        Self {
            transports: HashMap::new(),
            settings,
            log: AttemptLog::new(),
        }
    }

    /// Register the transport used for one channel
    pub fn with_transport(mut self, channel: Channel, transport: Arc<dyn ChannelTransport>) -> Self {
        self.transports.insert(channel, transport);
        self
    }

    /// Share an existing attempt log instead of a fresh one
    pub fn with_attempt_log(mut self, log: AttemptLog) -> Self {
        self.log = log;
        self
    }

    pub fn attempt_log(&self) -> &AttemptLog {
        &self.log
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn has_transport(&self, channel: Channel) -> bool {
        self.transports.contains_key(&channel)
    }

    /// Deliver `alert` to every guardian given.
    ///
    /// Returns once each guardian is `Delivered` or `Failed`; no guardian can
    /// hold the call longer than the configured deadline.
    pub async fn dispatch(&self, alert: &Alert, guardians: &[Guardian]) -> DispatchReport {
        let mut report = DispatchReport::new(alert.id);

        if guardians.is_empty() {
            warn!(alert_id = %alert.id, "No active guardians to notify");
            return report;
        }

        for guardian in guardians {
            report.record(&guardian.id, DeliveryOutcome::Pending, None);
        }

        info!(
            alert_id = %alert.id,
            severity = ?alert.severity,
            guardians = guardians.len(),
            "Dispatching alert"
        );

        let alert = Arc::new(alert.clone());
        // Every guardian shares one deadline, counted from the start of dispatch.
        let deadline = Instant::now() + self.settings.guardian_deadline;

        let results: Vec<GuardianResult> = join_all(
            guardians
                .iter()
                .cloned()
                .map(|guardian| self.deliver_to_guardian(Arc::clone(&alert), guardian, deadline)),
        )
        .await;

        for (guardian_id, outcome, via) in results {
            report.record(&guardian_id, outcome, via);
        }

        info!(
            alert_id = %alert.id,
            delivered = report.delivered_count,
            failed = report.failed_count,
            "Dispatch complete"
        );
        report
    }

    async fn deliver_to_guardian(
        &self,
        alert: Arc<Alert>,
        guardian: Guardian,
        deadline: Instant,
    ) -> GuardianResult {
        let in_flight: Mutex<Option<InFlight>> = Mutex::new(None);

        let result =
            tokio::time::timeout_at(deadline, self.try_channels(&alert, &guardian, &in_flight))
                .await;

        match result {
            Ok(Some(channel)) => (guardian.id, DeliveryOutcome::Delivered, Some(channel)),
            Ok(None) => {
                warn!(
                    alert_id = %alert.id,
                    guardian_id = %guardian.id,
                    "Every channel exhausted, guardian not reached"
                );
                (guardian.id, DeliveryOutcome::Failed, None)
            }
            Err(_) => {
                let outstanding = in_flight.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(pending) = outstanding {
                    pending.abandoned.store(true, Ordering::SeqCst);
                    self.record(
                        &alert,
                        &guardian,
                        pending.channel,
                        pending.attempt,
                        DeliveryOutcome::TimedOut,
                        Some("guardian deadline elapsed".to_string()),
                    );
                }
                warn!(
                    alert_id = %alert.id,
                    guardian_id = %guardian.id,
                    deadline_secs = self.settings.guardian_deadline.as_secs(),
                    "Guardian deadline elapsed"
                );
                (guardian.id, DeliveryOutcome::Failed, None)
            }
        }
    }

    /// Walk the guardian's channels in priority order. Returns the channel
    /// that delivered, or `None` when all are exhausted.
    async fn try_channels(
        &self,
        alert: &Arc<Alert>,
        guardian: &Guardian,
        in_flight: &Mutex<Option<InFlight>>,
    ) -> Option<Channel> {
        for channel in guardian.channels_by_priority() {
            let Some(transport) = self.transports.get(&channel) else {
                let reason = SendError::NoTransport(channel.to_string());
                self.record(alert, guardian, channel, 1, DeliveryOutcome::Failed, Some(reason.to_string()));
                continue;
            };

            let mut attempt = 1;
            loop {
                let abandoned = Arc::new(AtomicBool::new(false));
                set_in_flight(
                    in_flight,
                    Some(InFlight {
                        channel,
                        attempt,
                        abandoned: Arc::clone(&abandoned),
                    }),
                );

                let result = self
                    .send_once(Arc::clone(transport), alert, guardian, channel, abandoned)
                    .await;

                // Record before evaluating the next step
                set_in_flight(in_flight, None);
                match result {
                    AttemptResult::Delivered => {
                        self.record(alert, guardian, channel, attempt, DeliveryOutcome::Delivered, None);
                        info!(
                            alert_id = %alert.id,
                            guardian_id = %guardian.id,
                            channel = %channel,
                            attempt,
                            "Guardian reached"
                        );
                        return Some(channel);
                    }
                    AttemptResult::Failed(reason) => {
                        self.record(alert, guardian, channel, attempt, DeliveryOutcome::Failed, Some(reason));
                    }
                    AttemptResult::TimedOut(reason) => {
                        self.record(alert, guardian, channel, attempt, DeliveryOutcome::TimedOut, Some(reason));
                    }
                }

                if !self.settings.retry.should_retry(attempt) {
                    warn!(
                        alert_id = %alert.id,
                        guardian_id = %guardian.id,
                        channel = %channel,
                        "Channel exhausted, falling back"
                    );
                    break;
                }

                let backoff = self.settings.retry.delay_after(attempt);
                debug!(
                    alert_id = %alert.id,
                    guardian_id = %guardian.id,
                    channel = %channel,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Send failed, backing off"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
        None
    }

    /// One try on one channel. The send runs as its own task so a result
    /// arriving after the attempt was given up on can still be logged.
    async fn send_once(
        &self,
        transport: Arc<dyn ChannelTransport>,
        alert: &Arc<Alert>,
        guardian: &Guardian,
        channel: Channel,
        abandoned: Arc<AtomicBool>,
    ) -> AttemptResult {
        let task_alert = Arc::clone(alert);
        let task_guardian = guardian.clone();
        let task_abandoned = Arc::clone(&abandoned);

        let handle = tokio::spawn(async move {
            let result = transport.send(&task_guardian, channel, &task_alert).await;
            if task_abandoned.load(Ordering::SeqCst) {
                debug!(
                    alert_id = %task_alert.id,
                    guardian_id = %task_guardian.id,
                    channel = %channel,
                    transport = transport.name(),
                    delivered = result.is_ok(),
                    "Late send result discarded"
                );
            }
            result
        });

        match tokio::time::timeout(self.settings.attempt_timeout, handle).await {
            Ok(Ok(Ok(()))) => AttemptResult::Delivered,
            Ok(Ok(Err(e))) => AttemptResult::Failed(e.to_string()),
            Ok(Err(join_error)) => AttemptResult::Failed(format!("Transport task failed: {}", join_error)),
            Err(_) => {
                abandoned.store(true, Ordering::SeqCst);
                AttemptResult::TimedOut(format!(
                    "Send timed out after {}s",
                    self.settings.attempt_timeout.as_secs()
                ))
            }
        }
    }

    fn record(
        &self,
        alert: &Alert,
        guardian: &Guardian,
        channel: Channel,
        attempt_number: u32,
        outcome: DeliveryOutcome,
        detail: Option<String>,
    ) {
        if outcome != DeliveryOutcome::Delivered {
            debug!(
                alert_id = %alert.id,
                guardian_id = %guardian.id,
                channel = %channel,
                attempt = attempt_number,
                outcome = %outcome,
                detail = detail.as_deref().unwrap_or(""),
                "Delivery attempt recorded"
            );
        }
        self.log.append(DeliveryAttempt {
            alert_id: alert.id,
            guardian_id: guardian.id.clone(),
            channel,
            attempt_number,
            outcome,
            timestamp: Utc::now(),
            detail,
        });
    }
}

fn set_in_flight(slot: &Mutex<Option<InFlight>>, value: Option<InFlight>) {
    *slot.lock().unwrap_or_else(|e| e.into_inner()) = value;
}
