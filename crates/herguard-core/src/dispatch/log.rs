use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::models::DeliveryAttempt;

/// Append-only record of every delivery attempt.
/// Clone is cheap - clones share the same underlying log.
#[derive(Debug, Clone, Default)]
pub struct AttemptLog {
    records: Arc<Mutex<Vec<DeliveryAttempt>>>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, attempt: DeliveryAttempt) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(attempt);
    }

    /// Copy of every record, in append order
    pub fn records(&self) -> Vec<DeliveryAttempt> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn for_alert(&self, alert_id: Uuid) -> Vec<DeliveryAttempt> {
        self.filtered(|a| a.alert_id == alert_id)
    }

    pub fn for_guardian(&self, alert_id: Uuid, guardian_id: &str) -> Vec<DeliveryAttempt> {
        self.filtered(|a| a.alert_id == alert_id && a.guardian_id == guardian_id)
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn filtered(&self, keep: impl Fn(&DeliveryAttempt) -> bool) -> Vec<DeliveryAttempt> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().filter(|a| keep(a)).cloned().collect()
    }
}
