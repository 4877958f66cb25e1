use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Alert, DeliveryAttempt, DispatchReport};

/// File name prefix for episode records
const EPISODE_PREFIX: &str = "episode_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recorded<T> {
    pub data: T,
    pub recorded_at: DateTime<Utc>,
}

impl<T> Recorded<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            recorded_at: Utc::now(),
        }
    }
}

/// Everything known about one finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub alert: Alert,
    pub report: DispatchReport,
    pub attempts: Vec<DeliveryAttempt>,
}

#[derive(Debug, Clone)]
pub struct AuditStore {
    dir: PathBuf,
}

impl AuditStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audit directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn episode_path(&self, alert_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}{}.json", EPISODE_PREFIX, alert_id))
    }

    /// Write an episode. The file is written beside its final name and renamed
    /// into place so readers never see a partial record.
    pub fn record_episode(&self, episode: &EpisodeRecord) -> Result<PathBuf> {
        let recorded = Recorded::new(episode);
        let path = self.episode_path(episode.alert.id);
        let tmp = path.with_extension("json.tmp");

        let contents = serde_json::to_string_pretty(&recorded)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write audit record: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to finalize audit record: {}", path.display()))?;

        debug!(alert_id = %episode.alert.id, path = %path.display(), "Episode recorded");
        Ok(path)
    }

    pub fn load_episode(&self, alert_id: Uuid) -> Result<Option<Recorded<EpisodeRecord>>> {
        let path = self.episode_path(alert_id);
        if !path.exists() {
            return Ok(None);
        }
        read_episode(&path).map(Some)
    }

    /// All readable episodes, newest alert first. Unreadable files are skipped.
    pub fn list_episodes(&self) -> Result<Vec<Recorded<EpisodeRecord>>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read audit directory: {}", self.dir.display()))?;

        let mut episodes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_episode = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(EPISODE_PREFIX) && n.ends_with(".json"));
            if !is_episode {
                continue;
            }
            match read_episode(&path) {
                Ok(episode) => episodes.push(episode),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable audit record"),
            }
        }

        episodes.sort_by(|a, b| b.data.alert.triggered_at.cmp(&a.data.alert.triggered_at));
        Ok(episodes)
    }
}

fn read_episode(path: &Path) -> Result<Recorded<EpisodeRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read audit record: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse audit record: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, DeliveryOutcome, Severity};
    use chrono::Duration;

    fn temp_store() -> AuditStore {
        let dir = std::env::temp_dir().join(format!("herguard-audit-{}", Uuid::new_v4()));
        AuditStore::new(dir).expect("creates store")
    }

    fn episode(severity: Severity) -> EpisodeRecord {
        let alert = Alert::new(severity, None, None, false);
        let mut report = DispatchReport::new(alert.id);
        report.record("mom", DeliveryOutcome::Delivered, Some(Channel::Push));
        let attempts = vec![DeliveryAttempt {
            alert_id: alert.id,
            guardian_id: "mom".to_string(),
            channel: Channel::Push,
            attempt_number: 1,
            outcome: DeliveryOutcome::Delivered,
            timestamp: Utc::now(),
            detail: None,
        }];
        EpisodeRecord {
            alert,
            report,
            attempts,
        }
    }

    #[test]
    fn test_record_and_load() {
        let store = temp_store();
        let record = episode(Severity::Real);
        let path = store.record_episode(&record).expect("writes");
        assert!(path.ends_with(format!("episode_{}.json", record.alert.id)));

        let loaded = store
            .load_episode(record.alert.id)
            .expect("reads")
            .expect("exists");
        assert_eq!(loaded.data, record);

        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_load_missing_episode() {
        let store = temp_store();
        assert!(store.load_episode(Uuid::new_v4()).expect("reads").is_none());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[test]
    fn test_list_newest_first_and_skips_junk() {
        let store = temp_store();
        let mut older = episode(Severity::Test);
        older.alert.triggered_at = Utc::now() - Duration::hours(2);
        let newer = episode(Severity::Real);
        store.record_episode(&older).expect("writes");
        store.record_episode(&newer).expect("writes");
        std::fs::write(store.dir().join("episode_broken.json"), "{").expect("write junk");
        std::fs::write(store.dir().join("notes.txt"), "ignored").expect("write junk");

        let episodes = store.list_episodes().expect("lists");
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].data.alert.id, newer.alert.id);
        assert_eq!(episodes[1].data.alert.id, older.alert.id);

        let _ = std::fs::remove_dir_all(store.dir());
    }
}
