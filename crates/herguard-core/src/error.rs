use thiserror::Error;

/// Caller-misuse errors from the SOS controller. None of these change state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SosError {
    #[error("An SOS session is already active")]
    SessionAlreadyActive,

    #[error("Alert is already being dispatched - cancellation is no longer possible")]
    AlreadyDispatching,

    #[error("Session has not resolved yet")]
    NotResolved,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardianError {
    #[error("Invalid guardian state: {0}")]
    InvalidGuardianState(String),

    #[error("Guardian not found: {0}")]
    NotFound(String),

    #[error("Guardian already registered: {0}")]
    Duplicate(String),

    #[error("Guardian needs both a name and a phone number")]
    MissingContact,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location unavailable: {0}")]
    Unavailable(String),

    #[error("Permission to access location was denied")]
    PermissionDenied,
}

/// Per-attempt channel failures. Recorded on the attempt log, never returned
/// from `NotificationDispatcher::dispatch`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("No network connection")]
    NoNetwork,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Rejected by carrier: {0}")]
    Rejected(String),

    #[error("No transport registered for channel {0}")]
    NoTransport(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    #[error("Latitude out of range [-90, 90]: {0}")]
    LatitudeOutOfRange(f64),

    #[error("Longitude out of range [-180, 180]: {0}")]
    LongitudeOutOfRange(f64),
}

/// Maximum length for carrier reasons carried in error messages
const MAX_REASON_LENGTH: usize = 200;

impl SendError {
    /// Build a `Rejected` error, truncating long carrier responses
    pub fn rejected(reason: &str) -> Self {
        if reason.len() <= MAX_REASON_LENGTH {
            SendError::Rejected(reason.to_string())
        } else {
            let cut: String = reason.chars().take(MAX_REASON_LENGTH).collect();
            SendError::Rejected(format!("{}... (truncated, {} total bytes)", cut, reason.len()))
        }
    }
}
