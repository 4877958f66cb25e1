//! HERGuard core library.
//!
//! The emergency path of the HERGuard personal-safety app, free of any UI:
//!
//! - `sos` - the SOS state machine (arm, countdown, cancel, escalate, resolve)
//! - `zones` - nearest-safe-zone resolution over a copy-on-write catalog
//! - `dispatch` - guardian notification fan-out with retry, channel fallback
//!   and per-guardian deadlines
//! - `guardians` - the user's guardian list
//! - `audit` - JSON audit trail of finished episodes
//! - `config` - persisted settings
//!
//! Transport, location and evidence-capture hardware are injected through
//! the `ChannelTransport`, `LocationProvider` and `EvidenceCapture` traits.

pub mod audit;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod guardians;
pub mod models;
pub mod sos;
pub mod utils;
pub mod zones;

pub use config::Config;
pub use error::{GeoError, GuardianError, LocationError, SendError, SosError};
pub use geo::{distance_km, GeoPoint};
