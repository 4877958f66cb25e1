//! SOS session orchestration: countdown, cancel, escalation and dispatch.

mod collaborators;
mod controller;
mod session;

pub use collaborators::{EvidenceCapture, FailingLocation, FixedLocation, LocationProvider, NoopEvidenceCapture};
pub use controller::{SosController, SosControllerBuilder};
pub use session::{CancelOutcome, SosSession, SosState};
