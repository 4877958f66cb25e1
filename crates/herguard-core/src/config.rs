//! Application configuration management.
//!
//! Holds the SOS toggles (countdown length, evidence mode, location sharing)
//! and the dispatcher's timing knobs, plus optional paths to the zone
//! catalog, guardian list and audit directory.
//!
//! Configuration is stored at `~/.config/herguard/config.json` unless the
//! `HERGUARD_CONFIG` environment variable points elsewhere.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::dispatch::{DispatchSettings, RetryPolicy};

/// Application name used for config/data directory paths
const APP_NAME: &str = "herguard";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "HERGUARD_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SosConfig {
    /// Seconds between arming and escalation
    pub countdown_secs: u64,
    /// Start evidence capture when arming
    pub evidence_mode_enabled: bool,
    /// Include the current location in alerts
    pub auto_send_location: bool,
    pub location_timeout_secs: u64,
}

impl Default for SosConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 10,
            evidence_mode_enabled: true,
            auto_send_location: true,
            location_timeout_secs: 5,
        }
    }
}

impl SosConfig {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub guardian_deadline_secs: u64,
    pub max_tries_per_channel: u32,
    pub backoff_base_secs: u64,
    pub backoff_factor: f64,
    pub backoff_cap_secs: u64,
    pub attempt_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            guardian_deadline_secs: 60,
            max_tries_per_channel: 3,
            backoff_base_secs: 2,
            backoff_factor: 2.0,
            backoff_cap_secs: 30,
            attempt_timeout_secs: 15,
        }
    }
}

impl DispatchConfig {
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            retry: RetryPolicy {
                max_tries: self.max_tries_per_channel,
                base_delay: Duration::from_secs(self.backoff_base_secs),
                backoff_factor: self.backoff_factor,
                max_delay: Duration::from_secs(self.backoff_cap_secs),
            },
            guardian_deadline: Duration::from_secs(self.guardian_deadline_secs),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sos: SosConfig,
    pub dispatch: DispatchConfig,
    /// Safe zone catalog; the bundled Dhaka catalog when unset
    pub zones_file: Option<PathBuf>,
    pub guardians_file: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Where episode records are written
    pub fn audit_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.audit_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join("audit"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sos.countdown_secs == 0 {
            bail!("sos.countdown_secs must be greater than zero");
        }
        if self.dispatch.guardian_deadline_secs == 0 {
            bail!("dispatch.guardian_deadline_secs must be greater than zero");
        }
        if self.dispatch.max_tries_per_channel == 0 {
            bail!("dispatch.max_tries_per_channel must be at least 1");
        }
        if self.dispatch.attempt_timeout_secs == 0 {
            bail!("dispatch.attempt_timeout_secs must be greater than zero");
        }
        if !self.dispatch.backoff_factor.is_finite() || self.dispatch.backoff_factor < 1.0 {
            bail!(
                "dispatch.backoff_factor must be a finite number >= 1, got {}",
                self.dispatch.backoff_factor
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("herguard-config-{}", uuid::Uuid::new_v4()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sos.countdown(), Duration::from_secs(10));
        assert!(config.sos.evidence_mode_enabled);
        assert!(config.sos.auto_send_location);
        assert!(config.validate().is_ok());

        let settings = config.dispatch.settings();
        assert_eq!(settings, DispatchSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().expect("has parent")).expect("create dir");
        std::fs::write(&path, r#"{"sos": {"countdown_secs": 5}}"#).expect("write");

        let config = Config::load_from(&path).expect("loads");
        assert_eq!(config.sos.countdown_secs, 5);
        assert!(config.sos.evidence_mode_enabled);
        assert_eq!(config.dispatch.guardian_deadline_secs, 60);
        assert!(config.zones_file.is_none());

        let _ = std::fs::remove_dir_all(path.parent().expect("has parent"));
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path();
        let mut config = Config::default();
        config.sos.evidence_mode_enabled = false;
        config.dispatch.max_tries_per_channel = 2;
        config.audit_dir = Some(PathBuf::from("/tmp/herguard-audit"));
        config.save_to(&path).expect("saves");

        assert_eq!(Config::load_from(&path).expect("loads"), config);
        let _ = std::fs::remove_dir_all(path.parent().expect("has parent"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.sos.countdown_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.guardian_deadline_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.max_tries_per_channel = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dispatch.backoff_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().expect("has parent")).expect("create dir");
        std::fs::write(&path, r#"{"dispatch": {"max_tries_per_channel": 0}}"#).expect("write");
        assert!(Config::load_from(&path).is_err());
        let _ = std::fs::remove_dir_all(path.parent().expect("has parent"));
    }

    #[test]
    fn test_explicit_audit_dir() {
        let config = Config {
            audit_dir: Some(PathBuf::from("/var/lib/herguard")),
            ..Default::default()
        };
        assert_eq!(config.audit_dir().expect("resolves"), PathBuf::from("/var/lib/herguard"));
    }
}
