//! On-disk configuration (`~/.config/sysmon/config.toml`) with environment
//! overrides.

use crate::alerts::Thresholds;
use crate::collector::CollectorConfig;
use crate::ranking::SortKey;
use log::info;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_REFRESH_INTERVAL_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't get home directory")]
    NoHomeDir,

    #[error("couldn't access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file format: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub runtime: RuntimeConfig,
    pub display: DisplayConfig,
    pub alerts: AlertConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub refresh_interval_ms: u64,
    /// Points kept per trend series.
    pub history_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            history_capacity: crate::timeseries::DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Rows shown in the process view; the snapshot keeps every process.
    pub max_processes: usize,
    pub default_sort: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_processes: 15,
            default_sort: "cpu".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub max_alerts: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { max_alerts: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `SYSMON_CONFIG` if set, otherwise `$HOME/.config/sysmon/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = env::var("SYSMON_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = env::var_os("HOME").ok_or(ConfigError::NoHomeDir)?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("sysmon")
            .join("config.toml"))
    }

    /// Read `path`, writing a default file there first if none exists.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("[config] wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| env::var(key).ok());
    }

    /// Apply `SYSMON_*` overrides; values that do not parse are ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let float = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

        if let Some(v) = float("SYSMON_CPU_THRESHOLD") {
            self.thresholds.cpu = v;
        }
        if let Some(v) = float("SYSMON_MEMORY_THRESHOLD") {
            self.thresholds.memory = v;
        }
        if let Some(v) = float("SYSMON_DISK_THRESHOLD") {
            self.thresholds.disk = v;
        }
        if let Some(v) = float("SYSMON_SWAP_THRESHOLD") {
            self.thresholds.swap = v;
        }
        if let Some(v) =
            lookup("SYSMON_REFRESH_INTERVAL_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.runtime.refresh_interval_ms = v;
        }
        if let Some(v) = lookup("SYSMON_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        for (name, value) in [
            ("cpu", t.cpu),
            ("memory", t.memory),
            ("disk", t.disk),
            ("swap", t.swap),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} threshold {value} outside 0-100"
                )));
            }
        }
        if self.alerts.max_alerts == 0 {
            return Err(ConfigError::Invalid("max_alerts must be at least 1".into()));
        }
        if self.runtime.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.runtime.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "refresh_interval_ms must be at least {MIN_REFRESH_INTERVAL_MS}"
            )));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.refresh_interval_ms)
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey::from(self.display.default_sort.as_str())
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            thresholds: self.thresholds,
            max_alerts: self.alerts.max_alerts,
            history_capacity: self.runtime.history_capacity,
            sort_key: self.sort_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[thresholds]"));
        assert!(written.contains("refresh_interval_ms = 1000"));
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[thresholds]\ncpu = 70.0\n\n[display]\ndefault_sort = \"name\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.thresholds.cpu, 70.0);
        assert_eq!(config.thresholds.memory, 85.0);
        assert_eq!(config.alerts.max_alerts, 100);
        assert_eq!(config.sort_key(), SortKey::Name);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[thresholds\ncpu = ").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("SYSMON_CPU_THRESHOLD", "60"),
            ("SYSMON_DISK_THRESHOLD", "not-a-number"),
            ("SYSMON_REFRESH_INTERVAL_MS", "250"),
            ("SYSMON_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.thresholds.cpu, 60.0);
        assert_eq!(config.thresholds.disk, 90.0);
        assert_eq!(config.refresh_interval(), Duration::from_millis(250));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        assert!(Config::default().validate().is_ok());

        let mut config = Config::default();
        config.thresholds.swap = 120.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.alerts.max_alerts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.runtime.refresh_interval_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_sort_mode_maps_to_cpu() {
        let mut config = Config::default();
        config.display.default_sort = "bogus".into();
        assert_eq!(config.collector_config().sort_key, SortKey::Cpu);
    }
}
