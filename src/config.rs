use crate::alerts::AlertSettings;
use crate::error::ConfigError;
use crate::posture::Sensitivity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 20..=80 in steps of 5; higher flags smaller deviations
    pub sensitivity: u8,
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    /// Pass interval while the host surface is hidden
    pub hidden_interval_ms: u64,
    /// JSON file holding the daily posture history
    pub ledger_path: String,
    pub tone_sample_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::DEFAULT.value(),
            sound_enabled: true,
            notifications_enabled: true,
            hidden_interval_ms: 1000,
            ledger_path: "posture-history.json".to_string(),
            tone_sample_rate: 44_100,
        }
    }
}

/// Validated runtime view of [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub sensitivity: Sensitivity,
    pub alerts: AlertSettings,
    pub hidden_interval: Duration,
    pub tone_sample_rate: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: Sensitivity::DEFAULT,
            alerts: AlertSettings::default(),
            hidden_interval: Duration::from_millis(1000),
            tone_sample_rate: 44_100,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings().map(|_| ())
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        if self.hidden_interval_ms == 0 {
            return Err(ConfigError::ZeroHiddenInterval);
        }
        if self.tone_sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }

        Ok(Settings {
            sensitivity: Sensitivity::new(self.sensitivity)?,
            alerts: AlertSettings {
                sound_enabled: self.sound_enabled,
                notifications_enabled: self.notifications_enabled,
            },
            hidden_interval: Duration::from_millis(self.hidden_interval_ms),
            tone_sample_rate: self.tone_sample_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Config::default().settings().unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("sensitivity = 65\nsound_enabled = false\n").unwrap();
        assert_eq!(config.sensitivity, 65);
        assert!(!config.sound_enabled);
        assert!(config.notifications_enabled);
        assert_eq!(config.hidden_interval_ms, 1000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config {
            sensitivity: 90,
            ..Config::default()
        };
        assert_eq!(config.settings(), Err(ConfigError::SensitivityOutOfRange(90)));

        config.sensitivity = 33;
        assert_eq!(config.settings(), Err(ConfigError::SensitivityOffGrid(33)));

        config.sensitivity = 50;
        config.hidden_interval_ms = 0;
        assert_eq!(config.settings(), Err(ConfigError::ZeroHiddenInterval));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("posture-sentinel-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let config = Config {
            sensitivity: 70,
            notifications_enabled: false,
            ..Config::default()
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);

        fs::write(&path, "sensitivity = 13\n").unwrap();
        assert!(Config::load(&path).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default("/nonexistent/posture-sentinel.toml").unwrap();
        assert_eq!(config, Config::default());
    }
}
