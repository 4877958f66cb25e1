//! The SOS state machine.
//!
//! `Idle -> Armed -> Dispatching -> Resolved`, with `Armed -> Idle` on cancel.
//! One authoritative session lives behind a mutex inside the controller;
//! callers only ever see `SosSession` snapshots, either polled through
//! `current_state()` or pushed through `subscribe()`.
//!
//! Every phase change bumps a generation counter. The countdown task checks
//! it under the lock before acting, so a cancelled countdown can never fire
//! a residual tick or escalate.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audit::{AuditStore, EpisodeRecord};
use crate::config::SosConfig;
use crate::dispatch::{AttemptLog, NotificationDispatcher};
use crate::error::SosError;
use crate::geo::GeoPoint;
use crate::guardians::GuardianRegistry;
use crate::models::{Alert, DispatchReport, Severity, ZoneSuggestion};
use crate::zones::SafeZoneRegistry;

use super::collaborators::{EvidenceCapture, FailingLocation, LocationProvider, NoopEvidenceCapture};
use super::session::{CancelOutcome, SosSession, SosState};

/// Countdown granularity
const TICK: Duration = Duration::from_secs(1);

enum Phase {
    Idle {
        last_cancel: Option<String>,
    },
    Armed {
        armed_at: DateTime<Utc>,
        deadline: Option<DateTime<Utc>>,
        remaining_secs: u64,
        countdown: JoinHandle<()>,
    },
    Dispatching {
        armed_at: DateTime<Utc>,
        alert: Option<Alert>,
    },
    Resolved {
        armed_at: DateTime<Utc>,
        alert: Alert,
        report: DispatchReport,
    },
}

struct Machine {
    phase: Phase,
    generation: u64,
}

impl Machine {
    fn snapshot(&self) -> SosSession {
        match &self.phase {
            Phase::Idle { last_cancel } => SosSession {
                cancel_reason: last_cancel.clone(),
                ..SosSession::idle()
            },
            Phase::Armed {
                armed_at,
                deadline,
                remaining_secs,
                ..
            } => SosSession {
                state: SosState::Armed,
                armed_at: Some(*armed_at),
                countdown_deadline: *deadline,
                remaining_secs: Some(*remaining_secs),
                ..SosSession::idle()
            },
            Phase::Dispatching { armed_at, alert } => SosSession {
                state: SosState::Dispatching,
                armed_at: Some(*armed_at),
                alert: alert.clone(),
                ..SosSession::idle()
            },
            Phase::Resolved {
                armed_at,
                alert,
                report,
            } => SosSession {
                state: SosState::Resolved,
                armed_at: Some(*armed_at),
                alert: Some(alert.clone()),
                report: Some(report.clone()),
                ..SosSession::idle()
            },
        }
    }
}

struct Inner {
    config: SosConfig,
    zones: Arc<SafeZoneRegistry>,
    guardians: Arc<GuardianRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
    location: Arc<dyn LocationProvider>,
    evidence: Arc<dyn EvidenceCapture>,
    audit: Option<AuditStore>,
    machine: Mutex<Machine>,
    updates: watch::Sender<SosSession>,
    last_test_report: Mutex<Option<DispatchReport>>,
}

/// Builder for [`SosController`]. Unset collaborators default to an empty
/// zone registry, an empty guardian list, a location provider that always
/// fails and a no-op evidence capture.
pub struct SosControllerBuilder {
    config: SosConfig,
    dispatcher: Arc<NotificationDispatcher>,
    zones: Arc<SafeZoneRegistry>,
    guardians: Arc<GuardianRegistry>,
    location: Arc<dyn LocationProvider>,
    evidence: Arc<dyn EvidenceCapture>,
    audit: Option<AuditStore>,
}

impl SosControllerBuilder {
    pub fn zones(mut self, zones: Arc<SafeZoneRegistry>) -> Self {
        self.zones = zones;
        self
    }

    pub fn guardians(mut self, guardians: Arc<GuardianRegistry>) -> Self {
        self.guardians = guardians;
        self
    }

    pub fn location_provider(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = location;
        self
    }

    pub fn evidence_capture(mut self, evidence: Arc<dyn EvidenceCapture>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn audit_store(mut self, audit: AuditStore) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> SosController {
        let machine = Machine {
            phase: Phase::Idle { last_cancel: None },
            generation: 0,
        };
        let (updates, _) = watch::channel(machine.snapshot());
        SosController {
            inner: Arc::new(Inner {
                config: self.config,
                zones: self.zones,
                guardians: self.guardians,
                dispatcher: self.dispatcher,
                location: self.location,
                evidence: self.evidence,
                audit: self.audit,
                machine: Mutex::new(machine),
                updates,
                last_test_report: Mutex::new(None),
            }),
        }
    }
}

/// Orchestrates arm, countdown, cancel, escalation and dispatch.
///
/// Cloning is cheap and every clone drives the same session. Operations
/// that start timers (`arm`, `trigger_now`) must be called from within a
/// Tokio runtime.
#[derive(Clone)]
pub struct SosController {
    inner: Arc<Inner>,
}

impl SosController {
    pub fn builder(config: SosConfig, dispatcher: Arc<NotificationDispatcher>) -> SosControllerBuilder {
        SosControllerBuilder {
            config,
            dispatcher,
            zones: Arc::new(SafeZoneRegistry::new()),
            guardians: Arc::new(GuardianRegistry::new()),
            location: Arc::new(FailingLocation::default()),
            evidence: Arc::new(NoopEvidenceCapture),
            audit: None,
        }
    }

    /// Start the countdown. A resolved episode is cleared first.
    pub fn arm(&self) -> Result<SosSession, SosError> {
        let mut machine = self.inner.machine();
        let clears_resolved = match machine.phase {
            Phase::Armed { .. } | Phase::Dispatching { .. } => {
                warn!(state = %machine.snapshot().state, "Arm rejected, session already active");
                return Err(SosError::SessionAlreadyActive);
            }
            Phase::Resolved { .. } => {
                debug!("Clearing resolved episode before arming");
                true
            }
            Phase::Idle { .. } => false,
        };

        machine.generation += 1;
        let generation = machine.generation;
        let countdown_secs = self.inner.config.countdown_secs;
        let armed_at = Utc::now();
        let deadline = chrono::Duration::from_std(self.inner.config.countdown())
            .ok()
            .and_then(|d| armed_at.checked_add_signed(d));

        let countdown = tokio::spawn(run_countdown(Arc::clone(&self.inner), generation, countdown_secs));
        machine.phase = Phase::Armed {
            armed_at,
            deadline,
            remaining_secs: countdown_secs,
            countdown,
        };
        let snapshot = self.inner.publish(&machine);
        drop(machine);

        if self.inner.config.evidence_mode_enabled {
            // The finished episode's capture is still running
            if clears_resolved {
                self.inner.evidence.stop();
            }
            self.inner.evidence.start();
        }
        info!(countdown_secs, generation, "SOS armed");
        Ok(snapshot)
    }

    /// Stop the countdown. Rejected once dispatch has started; benign when
    /// nothing is armed.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<CancelOutcome, SosError> {
        let reason = reason.into();
        let mut machine = self.inner.machine();
        match machine.phase {
            Phase::Armed { .. } => {}
            Phase::Dispatching { .. } => {
                warn!(reason = %reason, "Cancel rejected, alert already dispatching");
                return Err(SosError::AlreadyDispatching);
            }
            Phase::Idle { .. } | Phase::Resolved { .. } => {
                debug!(reason = %reason, "Cancel ignored, nothing armed");
                return Ok(CancelOutcome::NotArmed);
            }
        }

        let previous = std::mem::replace(
            &mut machine.phase,
            Phase::Idle {
                last_cancel: Some(reason.clone()),
            },
        );
        if let Phase::Armed { countdown, .. } = previous {
            countdown.abort();
        }
        machine.generation += 1;
        self.inner.publish(&machine);
        drop(machine);

        if self.inner.config.evidence_mode_enabled {
            self.inner.evidence.stop();
        }
        info!(reason = %reason, "SOS cancelled");
        Ok(CancelOutcome::Cancelled)
    }

    /// Escalate immediately, skipping whatever is left of the countdown.
    /// Dispatch runs in the background; use `wait_resolved` for the result.
    pub fn trigger_now(&self) -> Result<SosSession, SosError> {
        let mut machine = self.inner.machine();
        let armed_at = match &machine.phase {
            Phase::Dispatching { .. } => {
                warn!("Trigger rejected, alert already dispatching");
                return Err(SosError::SessionAlreadyActive);
            }
            Phase::Armed { armed_at, .. } => Some(*armed_at),
            Phase::Idle { .. } | Phase::Resolved { .. } => None,
        };
        let fresh_session = armed_at.is_none();
        let clears_resolved = matches!(machine.phase, Phase::Resolved { .. });

        let previous = std::mem::replace(
            &mut machine.phase,
            Phase::Dispatching {
                armed_at: armed_at.unwrap_or_else(Utc::now),
                alert: None,
            },
        );
        if let Phase::Armed { countdown, .. } = previous {
            countdown.abort();
        }
        machine.generation += 1;
        let generation = machine.generation;
        let snapshot = self.inner.publish(&machine);
        drop(machine);

        if fresh_session && self.inner.config.evidence_mode_enabled {
            if clears_resolved {
                self.inner.evidence.stop();
            }
            self.inner.evidence.start();
        }
        info!(generation, "SOS triggered immediately");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_escalation(generation).await });
        Ok(snapshot)
    }

    /// Send a `Test` alert to every active guardian without touching the
    /// session. Rejected while a real session is armed or dispatching.
    pub async fn test_alert(&self) -> Result<DispatchReport, SosError> {
        if self.inner.machine().snapshot().is_active() {
            warn!("Test alert rejected, real session active");
            return Err(SosError::SessionAlreadyActive);
        }

        let (location, nearest) = self.inner.locate().await;
        let alert = Alert::new(Severity::Test, location, nearest, false);
        info!(alert_id = %alert.id, "Sending test alert");

        let guardians = self.inner.guardians.active_guardians();
        let report = self.inner.dispatcher.dispatch(&alert, &guardians).await;
        self.inner.record_audit(&alert, &report);

        *self
            .inner
            .last_test_report
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(report.clone());
        Ok(report)
    }

    /// Resolved -> Idle. No-op when already idle.
    pub fn reset(&self) -> Result<(), SosError> {
        let mut machine = self.inner.machine();
        match machine.phase {
            Phase::Idle { .. } => return Ok(()),
            Phase::Armed { .. } | Phase::Dispatching { .. } => return Err(SosError::NotResolved),
            Phase::Resolved { .. } => {}
        }
        machine.phase = Phase::Idle { last_cancel: None };
        machine.generation += 1;
        self.inner.publish(&machine);
        drop(machine);

        if self.inner.config.evidence_mode_enabled {
            self.inner.evidence.stop();
        }
        info!("SOS session reset");
        Ok(())
    }

    pub fn current_state(&self) -> SosSession {
        self.inner.machine().snapshot()
    }

    /// Receives a snapshot after every transition and countdown tick
    pub fn subscribe(&self) -> watch::Receiver<SosSession> {
        self.inner.updates.subscribe()
    }

    /// Wait for the current episode to resolve. Returns `None` if the
    /// session is, or becomes, idle instead.
    pub async fn wait_resolved(&self) -> Option<DispatchReport> {
        let mut updates = self.subscribe();
        loop {
            {
                let session = updates.borrow_and_update();
                match session.state {
                    SosState::Resolved => return session.report.clone(),
                    SosState::Idle => return None,
                    SosState::Armed | SosState::Dispatching => {}
                }
            }
            if updates.changed().await.is_err() {
                return self.dispatch_report();
            }
        }
    }

    /// Report of the resolved episode, if the session is resolved
    pub fn dispatch_report(&self) -> Option<DispatchReport> {
        match &self.inner.machine().phase {
            Phase::Resolved { report, .. } => Some(report.clone()),
            _ => None,
        }
    }

    pub fn last_test_report(&self) -> Option<DispatchReport> {
        self.inner
            .last_test_report
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn attempt_log(&self) -> &AttemptLog {
        self.inner.dispatcher.attempt_log()
    }
}

impl Inner {
    fn machine(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, machine: &Machine) -> SosSession {
        let snapshot = machine.snapshot();
        self.updates.send_replace(snapshot.clone());
        snapshot
    }

    /// Current location (bounded by the lookup timeout) and the nearest zone
    /// to it. The location is only returned when auto-send is enabled.
    async fn locate(&self) -> (Option<GeoPoint>, Option<ZoneSuggestion>) {
        let timeout = self.config.location_timeout();
        let location = match tokio::time::timeout(timeout, self.location.current_location()).await {
            Ok(Ok(point)) => Some(point),
            Ok(Err(e)) => {
                warn!(error = %e, "Location lookup failed, alerting without it");
                None
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Location lookup timed out, alerting without it");
                None
            }
        };

        let nearest = location
            .as_ref()
            .and_then(|point| self.zones.nearest(point, 1).into_iter().next());
        if location.is_some() && nearest.is_none() {
            warn!("No safe zone known");
        }

        let shared = if self.config.auto_send_location { location } else { None };
        (shared, nearest)
    }

    async fn run_escalation(&self, generation: u64) {
        let (location, nearest) = self.locate().await;
        let alert = Alert::new(
            Severity::Real,
            location,
            nearest,
            self.config.evidence_mode_enabled,
        );

        {
            let mut machine = self.machine();
            if machine.generation != generation {
                warn!(alert_id = %alert.id, "Escalation superseded, dropping alert");
                return;
            }
            if let Phase::Dispatching { alert: slot, .. } = &mut machine.phase {
                *slot = Some(alert.clone());
            }
            self.publish(&machine);
        }

        info!(
            alert_id = %alert.id,
            has_location = alert.location.is_some(),
            has_safe_zone = alert.nearest_safe_zone.is_some(),
            "SOS escalated, dispatching"
        );
        let guardians = self.guardians.active_guardians();
        let report = self.dispatcher.dispatch(&alert, &guardians).await;
        self.record_audit(&alert, &report);

        let mut machine = self.machine();
        if machine.generation != generation {
            warn!(alert_id = %alert.id, "Session changed during dispatch, report not stored");
            return;
        }
        let armed_at = match &machine.phase {
            Phase::Dispatching { armed_at, .. } => *armed_at,
            _ => alert.triggered_at,
        };
        info!(
            alert_id = %alert.id,
            delivered = report.delivered_count,
            failed = report.failed_count,
            "SOS resolved"
        );
        machine.phase = Phase::Resolved {
            armed_at,
            alert,
            report,
        };
        self.publish(&machine);
    }

    fn record_audit(&self, alert: &Alert, report: &DispatchReport) {
        let Some(ref store) = self.audit else {
            return;
        };
        let episode = EpisodeRecord {
            alert: alert.clone(),
            report: report.clone(),
            attempts: self.dispatcher.attempt_log().for_alert(alert.id),
        };
        if let Err(e) = store.record_episode(&episode) {
            warn!(alert_id = %alert.id, error = %e, "Failed to write audit record");
        }
    }
}

async fn run_countdown(inner: Arc<Inner>, generation: u64, total_secs: u64) {
    let started = Instant::now();

    for tick in 1..=total_secs {
        tokio::time::sleep_until(started + TICK * u32::try_from(tick).unwrap_or(u32::MAX)).await;
        let remaining = total_secs - tick;

        let mut machine = inner.machine();
        if machine.generation != generation {
            return;
        }
        let Phase::Armed { remaining_secs, .. } = &mut machine.phase else {
            return;
        };
        *remaining_secs = remaining;
        if remaining > 0 {
            inner.publish(&machine);
        }
    }

    {
        let mut machine = inner.machine();
        if machine.generation != generation {
            return;
        }
        let armed_at = match &machine.phase {
            Phase::Armed { armed_at, .. } => *armed_at,
            _ => return,
        };
        machine.phase = Phase::Dispatching {
            armed_at,
            alert: None,
        };
        inner.publish(&machine);
    }
    info!(generation, "Countdown elapsed");

    inner.run_escalation(generation).await;
}
