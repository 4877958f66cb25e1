//! On-disk audit trail of SOS episodes.
//!
//! Each resolved episode (real or test) is written as one JSON file holding
//! the alert, the dispatch report and every delivery attempt, stamped with
//! the time it was recorded.

pub mod store;

pub use store::{AuditStore, EpisodeRecord, Recorded};
