//! Alert configuration
//!
//! The only state that survives a restart. It lives in a small JSON file
//! kept apart from the runtime cache; fields missing from the file take
//! their defaults, so older files keep loading as new settings are added.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::velocity::VelocityWindow;

/// Environment variable naming the alert config file.
pub const ALERT_CONFIG_ENV: &str = "BOOK_SYNC_ALERT_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Alert thresholds and toggles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    /// Fractional drop that raises a dip alert (0.10 = 10%).
    pub dip_threshold: Decimal,
    /// Fractional rise that raises a spike alert.
    pub spike_threshold: Decimal,
    /// Velocity window compared against the thresholds.
    pub detection_window: VelocityWindow,
    /// Minimum time between alerts of one type for one instrument.
    pub cooldown_ms: i64,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    /// Alert list cap; oldest dropped first.
    pub max_alerts: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dip_threshold: Decimal::new(10, 2),
            spike_threshold: Decimal::new(10, 2),
            detection_window: VelocityWindow::FiveSeconds,
            cooldown_ms: 30_000,
            sound_enabled: true,
            notifications_enabled: true,
            max_alerts: 50,
        }
    }
}

impl AlertConfig {
    /// Reject settings that can never behave sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |value: Decimal| value > Decimal::ZERO && value <= Decimal::ONE;

        if !in_range(self.dip_threshold) {
            return Err(ConfigError::Invalid(format!(
                "dip_threshold must be in (0, 1], got {}",
                self.dip_threshold
            )));
        }
        if !in_range(self.spike_threshold) {
            return Err(ConfigError::Invalid(format!(
                "spike_threshold must be in (0, 1], got {}",
                self.spike_threshold
            )));
        }
        if self.cooldown_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "cooldown_ms must not be negative, got {}",
                self.cooldown_ms
            )));
        }
        if self.max_alerts == 0 {
            return Err(ConfigError::Invalid("max_alerts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// JSON file backing an `AlertConfig`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertConfigStore {
    path: PathBuf,
}

impl AlertConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the path named by `BOOK_SYNC_ALERT_CONFIG`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(ALERT_CONFIG_ENV)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config; a missing file yields defaults.
    pub fn load(&self) -> Result<AlertConfig, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No alert config file, using defaults");
                return Ok(AlertConfig::default());
            }
            Err(err) => return Err(err.into()),
        };

        let config: AlertConfig = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %self.path.display(), "Loaded alert config");
        Ok(config)
    }

    /// Save the config, replacing the file atomically.
    pub fn save(&self, config: &AlertConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(config)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved alert config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AlertConfig::default();
        assert!(config.enabled);
        assert_eq!(config.dip_threshold, Decimal::from_str_exact("0.10").unwrap());
        assert_eq!(config.detection_window, VelocityWindow::FiveSeconds);
        assert_eq!(config.cooldown_ms, 30_000);
        assert_eq!(config.max_alerts, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_merges_with_defaults() {
        let config: AlertConfig =
            serde_json::from_str(r#"{"dip_threshold": "0.2", "sound_enabled": false}"#).unwrap();
        assert_eq!(config.dip_threshold, Decimal::from_str_exact("0.2").unwrap());
        assert!(!config.sound_enabled);
        assert_eq!(config.spike_threshold, AlertConfig::default().spike_threshold);
        assert_eq!(config.cooldown_ms, 30_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AlertConfig {
            dip_threshold: Decimal::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.dip_threshold = Decimal::new(10, 2);
        config.spike_threshold = Decimal::new(15, 1);
        assert!(config.validate().is_err());

        config.spike_threshold = Decimal::new(10, 2);
        config.max_alerts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_serializes_short_form() {
        let json = serde_json::to_string(&AlertConfig::default()).unwrap();
        assert!(json.contains("\"detection_window\":\"5s\""));
        assert!(json.contains("\"dip_threshold\":\"0.10\""));
    }
}
