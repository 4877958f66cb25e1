use std::collections::BTreeSet;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::error::GuardianError;
use crate::models::{Channel, Guardian, GuardianStatus};

/// The user's guardian list.
///
/// Every mutation keeps the invariant that an `Active` guardian has at least
/// one channel. Reads hand out clones so an in-progress dispatch never sees
/// a later edit.
#[derive(Debug, Default)]
pub struct GuardianRegistry {
    guardians: RwLock<Vec<Guardian>>,
}

impl GuardianRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, guardian: Guardian) -> Result<(), GuardianError> {
        check_entry(&guardian)?;

        let mut guardians = self.guardians.write().unwrap_or_else(|e| e.into_inner());
        if guardians.iter().any(|g| g.id == guardian.id) {
            return Err(GuardianError::Duplicate(guardian.id));
        }

        info!(
            guardian_id = %guardian.id,
            phone = %guardian.masked_phone(),
            status = %guardian.status,
            "Guardian added"
        );
        guardians.push(guardian);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Guardian, GuardianError> {
        let mut guardians = self.guardians.write().unwrap_or_else(|e| e.into_inner());
        let index = guardians
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| GuardianError::NotFound(id.to_string()))?;
        let removed = guardians.remove(index);
        info!(guardian_id = %id, "Guardian removed");
        Ok(removed)
    }

    pub fn update_status(&self, id: &str, status: GuardianStatus) -> Result<(), GuardianError> {
        let mut guardians = self.guardians.write().unwrap_or_else(|e| e.into_inner());
        let guardian = guardians
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GuardianError::NotFound(id.to_string()))?;

        if status == GuardianStatus::Active && !guardian.can_activate() {
            warn!(guardian_id = %id, "Refusing to activate guardian without channels");
            return Err(GuardianError::InvalidGuardianState(format!(
                "{} has no delivery channel",
                id
            )));
        }

        debug!(guardian_id = %id, from = %guardian.status, to = %status, "Guardian status changed");
        guardian.status = status;
        Ok(())
    }

    /// Replace a guardian's channel set. Emptying the channels of an
    /// active guardian is rejected.
    pub fn update_channels(
        &self,
        id: &str,
        channels: impl IntoIterator<Item = Channel>,
    ) -> Result<(), GuardianError> {
        let channels: BTreeSet<Channel> = channels.into_iter().collect();
        let mut guardians = self.guardians.write().unwrap_or_else(|e| e.into_inner());
        let guardian = guardians
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| GuardianError::NotFound(id.to_string()))?;

        if guardian.is_active() && channels.is_empty() {
            return Err(GuardianError::InvalidGuardianState(format!(
                "{} is active and needs at least one channel",
                id
            )));
        }
        guardian.channels = channels;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Guardian> {
        let guardians = self.guardians.read().unwrap_or_else(|e| e.into_inner());
        guardians.iter().find(|g| g.id == id).cloned()
    }

    pub fn list(&self) -> Vec<Guardian> {
        self.guardians.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Guardians that should receive alerts, in registration order
    pub fn active_guardians(&self) -> Vec<Guardian> {
        let guardians = self.guardians.read().unwrap_or_else(|e| e.into_inner());
        guardians.iter().filter(|g| g.is_active()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guardians.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add every guardian listed in a JSON file. All or nothing: one invalid
    /// or duplicate entry leaves the registry untouched.
    pub fn load_from_file(&self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read guardian file: {}", path.display()))?;
        let loaded: Vec<Guardian> =
            serde_json::from_str(&contents).context("Failed to parse guardian file")?;

        let mut ids = BTreeSet::new();
        for guardian in &loaded {
            check_entry(guardian)
                .with_context(|| format!("Invalid guardian entry: {}", guardian.id))?;
            if !ids.insert(guardian.id.as_str()) {
                return Err(GuardianError::Duplicate(guardian.id.clone()))
                    .context("Duplicate guardian in file");
            }
        }

        let mut guardians = self.guardians.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guardians.iter().find(|g| ids.contains(g.id.as_str())) {
            return Err(GuardianError::Duplicate(existing.id.clone()))
                .context("Guardian file repeats a registered guardian");
        }

        let count = loaded.len();
        info!(count, path = %path.display(), "Guardians loaded");
        guardians.extend(loaded);
        Ok(count)
    }
}

fn check_entry(guardian: &Guardian) -> Result<(), GuardianError> {
    if guardian.name.trim().is_empty() || guardian.phone_number.trim().is_empty() {
        return Err(GuardianError::MissingContact);
    }
    if guardian.is_active() && !guardian.can_activate() {
        return Err(GuardianError::InvalidGuardianState(format!(
            "{} has no delivery channel",
            guardian.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Relationship;

    fn guardian(id: &str, channels: &[Channel]) -> Guardian {
        Guardian::new(id, "Mom", "+8801712345678", channels.iter().copied(), Relationship::Family)
    }

    // -------------------------------------------------------------------------
    // Add / Remove Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_add_and_get() {
        let registry = GuardianRegistry::new();
        registry.add(guardian("g1", &[Channel::Push])).expect("valid guardian");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("g1").map(|g| g.name), Some("Mom".to_string()));
    }

    #[test]
    fn test_add_rejects_missing_contact() {
        let registry = GuardianRegistry::new();
        let mut g = guardian("g1", &[Channel::Sms]);
        g.phone_number = "  ".to_string();
        assert_eq!(registry.add(g), Err(GuardianError::MissingContact));

        let mut g = guardian("g2", &[Channel::Sms]);
        g.name = String::new();
        assert_eq!(registry.add(g), Err(GuardianError::MissingContact));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let registry = GuardianRegistry::new();
        registry.add(guardian("g1", &[Channel::Sms])).expect("valid guardian");
        assert_eq!(
            registry.add(guardian("g1", &[Channel::Push])),
            Err(GuardianError::Duplicate("g1".to_string()))
        );
    }

    #[test]
    fn test_add_rejects_active_without_channels() {
        let registry = GuardianRegistry::new();
        let g = guardian("g1", &[]).with_status(GuardianStatus::Active);
        assert!(matches!(
            registry.add(g),
            Err(GuardianError::InvalidGuardianState(_))
        ));
    }

    #[test]
    fn test_remove_unknown() {
        let registry = GuardianRegistry::new();
        assert_eq!(
            registry.remove("nobody"),
            Err(GuardianError::NotFound("nobody".to_string()))
        );
    }

    // -------------------------------------------------------------------------
    // Status Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_activation_requires_channel() {
        let registry = GuardianRegistry::new();
        registry.add(guardian("empty", &[])).expect("pending guardian without channels is fine");
        registry.add(guardian("ok", &[Channel::Voice])).expect("valid guardian");

        assert!(matches!(
            registry.update_status("empty", GuardianStatus::Active),
            Err(GuardianError::InvalidGuardianState(_))
        ));
        assert_eq!(registry.get("empty").map(|g| g.status), Some(GuardianStatus::Pending));

        registry.update_status("ok", GuardianStatus::Active).expect("activates");
        let active = registry.active_guardians();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "ok");
    }

    #[test]
    fn test_active_guardians_filters_status() {
        let registry = GuardianRegistry::new();
        registry.add(guardian("a", &[Channel::Push]).with_status(GuardianStatus::Active)).expect("valid");
        registry.add(guardian("p", &[Channel::Push])).expect("valid");
        registry.add(guardian("r", &[Channel::Push]).with_status(GuardianStatus::Revoked)).expect("valid");
        let ids: Vec<String> = registry.active_guardians().into_iter().map(|g| g.id).collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_cannot_empty_channels_of_active_guardian() {
        let registry = GuardianRegistry::new();
        registry.add(guardian("a", &[Channel::Push]).with_status(GuardianStatus::Active)).expect("valid");
        assert!(registry.update_channels("a", Vec::new()).is_err());
        registry.update_channels("a", [Channel::Sms, Channel::Voice]).expect("non-empty set is fine");
        let channels: Vec<Channel> = registry.get("a").expect("exists").channels.into_iter().collect();
        assert_eq!(channels, vec![Channel::Sms, Channel::Voice]);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("herguard-guardians-{}.json", uuid::Uuid::new_v4()));
        let json = r#"[
            {"id": "mom", "name": "Mom", "phone_number": "+8801712345678", "channels": ["push", "sms"],
             "relationship": "family", "status": "active"},
            {"id": "bf", "name": "Best Friend", "phone_number": "+8801812345678", "channels": ["sms"],
             "relationship": "friend", "status": "pending"}
        ]"#;
        std::fs::write(&path, json).expect("write guardians");

        let registry = GuardianRegistry::new();
        assert_eq!(registry.load_from_file(&path).expect("loads"), 2);
        assert_eq!(registry.active_guardians().len(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_with_bad_entry_adds_nothing() {
        let path = std::env::temp_dir().join(format!("herguard-guardians-{}.json", uuid::Uuid::new_v4()));
        let json = r#"[
            {"id": "mom", "name": "Mom", "phone_number": "+8801712345678", "channels": ["push"],
             "relationship": "family", "status": "active"},
            {"id": "aunt", "name": "Aunt", "phone_number": "", "channels": ["sms"],
             "relationship": "family", "status": "active"}
        ]"#;
        std::fs::write(&path, json).expect("write guardians");

        let registry = GuardianRegistry::new();
        assert!(registry.load_from_file(&path).is_err());
        assert!(registry.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_duplicates_atomically() {
        let path = std::env::temp_dir().join(format!("herguard-guardians-{}.json", uuid::Uuid::new_v4()));
        let json = r#"[
            {"id": "bf", "name": "Best Friend", "phone_number": "+8801812345678", "channels": ["sms"],
             "relationship": "friend", "status": "active"},
            {"id": "mom", "name": "Mom", "phone_number": "+8801712345678", "channels": ["push"],
             "relationship": "family", "status": "active"}
        ]"#;
        std::fs::write(&path, json).expect("write guardians");

        let registry = GuardianRegistry::new();
        registry.add(guardian("mom", &[Channel::Sms])).expect("valid guardian");

        let err = registry.load_from_file(&path).expect_err("mom already registered");
        assert!(matches!(
            err.downcast_ref::<GuardianError>(),
            Some(GuardianError::Duplicate(id)) if id == "mom"
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("bf").is_none());

        let _ = std::fs::remove_file(&path);
    }
}
