//! Guardian notification dispatch.
//!
//! - `transport` - the per-channel send seam and drill transports
//! - `retry` - backoff policy applied per channel
//! - `log` - append-only delivery attempt log
//! - `dispatcher` - parallel fan-out with channel fallback and deadlines

mod dispatcher;
mod log;
mod retry;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{
    DispatchSettings, NotificationDispatcher, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_GUARDIAN_DEADLINE,
};
pub use log::AttemptLog;
pub use retry::{
    RetryPolicy, DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_TRIES,
};
pub use transport::{ChannelTransport, FlakyTransport, SimulatedTransport};
