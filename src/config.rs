//! Configuration for the Deskguard agent.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the monitoring agent.
///
/// Holds operational knobs only. Filtering and alerting thresholds are named
/// constants in the aggregation module, not configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Debounce sensitivity: minimum span between input summary events
    #[serde(with = "duration_serde")]
    pub sensitivity: Duration,

    /// Path for storing state, telemetry, and the event log
    pub data_path: PathBuf,

    /// Whether monitoring is currently paused
    pub paused: bool,

    /// Seconds between reconciliation passes over the sensor services
    pub reconcile_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deskguard-agent");

        Self {
            sensitivity: Duration::from_secs(30),
            data_path: data_dir,
            paused: false,
            reconcile_interval_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deskguard-agent")
            .join("config.json")
    }

    /// Path of the JSON-lines event log.
    pub fn event_log_path(&self) -> PathBuf {
        self.data_path.join("events.jsonl")
    }

    /// Path of the persisted telemetry counters.
    pub fn telemetry_path(&self) -> PathBuf {
        self.data_path.join("telemetry.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sensitivity, Duration::from_secs(30));
        assert!(!config.paused);
        assert_eq!(config.reconcile_interval_secs, 30);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            sensitivity: Duration::from_secs(45),
            data_path: PathBuf::from("/tmp/deskguard"),
            paused: true,
            reconcile_interval_secs: 10,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.sensitivity, Duration::from_secs(45));
        assert!(parsed.paused);
    }

    #[test]
    fn test_derived_paths() {
        let config = Config::default();
        assert!(config.event_log_path().ends_with("events.jsonl"));
        assert!(config.telemetry_path().ends_with("telemetry.json"));
    }
}
