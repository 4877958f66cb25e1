use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Alert, DispatchReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SosState {
    Idle,
    Armed,
    Dispatching,
    Resolved,
}

impl std::fmt::Display for SosState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SosState::Idle => write!(f, "Idle"),
            SosState::Armed => write!(f, "Armed"),
            SosState::Dispatching => write!(f, "Dispatching"),
            SosState::Resolved => write!(f, "Resolved"),
        }
    }
}

/// Read-only snapshot of the controller's session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SosSession {
    pub state: SosState,
    pub armed_at: Option<DateTime<Utc>>,
    pub countdown_deadline: Option<DateTime<Utc>>,
    /// Whole seconds left on the countdown while `Armed`
    pub remaining_secs: Option<u64>,
    pub alert: Option<Alert>,
    /// Reason given for the most recent cancellation, kept on the idle session
    pub cancel_reason: Option<String>,
    pub report: Option<DispatchReport>,
}

impl SosSession {
    pub fn idle() -> Self {
        Self {
            state: SosState::Idle,
            armed_at: None,
            countdown_deadline: None,
            remaining_secs: None,
            alert: None,
            cancel_reason: None,
            report: None,
        }
    }

    /// Armed or dispatching
    pub fn is_active(&self) -> bool {
        matches!(self.state, SosState::Armed | SosState::Dispatching)
    }
}

/// Result of a cancel request that was not a misuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The countdown was stopped; no alert was created
    Cancelled,
    /// Nothing was armed
    NotArmed,
}
