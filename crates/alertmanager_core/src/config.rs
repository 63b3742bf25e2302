//! Process configuration.
//!
//! # Responsibility
//! - Collect policy inputs (capacity, retry bound, stream name) in one
//!   explicitly constructed value handed to every component.
//! - Read overrides from environment variables.
//!
//! # Invariants
//! - Built once at process start and read-only afterwards.
//! - Empty environment values mean "unset".

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DEFAULT_MAX_ACTIVE_ALERTS: usize = 5;
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 5;
pub const DEFAULT_STREAM: &str = "alerts";

pub const ENV_MAX_ACTIVE_ALERTS: &str = "MAX_FIRING_ALERTS";
pub const ENV_MAX_WRITE_ATTEMPTS: &str = "ALERTMANAGER_WRITE_ATTEMPTS";
pub const ENV_STREAM: &str = "ALERTMANAGER_STREAM";
pub const ENV_API_ENDPOINT: &str = "API_ENDPOINT";
pub const ENV_DB_PATH: &str = "ALERTMANAGER_DB";

/// Configuration shared by all alert engine components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertManagerConfig {
    /// Upper bound of concurrently active alerts.
    pub max_active_alerts: usize,
    /// Attempts of the read-decide-append cycle before giving up.
    pub max_write_attempts: u32,
    /// Event stream holding alert events.
    pub stream: String,
    /// Base URL for acknowledge links in notifications.
    pub api_endpoint: Option<String>,
    /// SQLite database file.
    pub db_path: Option<PathBuf>,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            max_active_alerts: DEFAULT_MAX_ACTIVE_ALERTS,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            stream: DEFAULT_STREAM.to_string(),
            api_endpoint: None,
            db_path: None,
        }
    }
}

impl AlertManagerConfig {
    /// Reads configuration from process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        if let Some(value) = read(ENV_MAX_ACTIVE_ALERTS) {
            config.max_active_alerts = value.parse().map_err(|err| ConfigError::InvalidValue {
                key: ENV_MAX_ACTIVE_ALERTS,
                value: value.clone(),
                reason: format!("{err}"),
            })?;
        }

        if let Some(value) = read(ENV_MAX_WRITE_ATTEMPTS) {
            let attempts: u32 = value.parse().map_err(|err| ConfigError::InvalidValue {
                key: ENV_MAX_WRITE_ATTEMPTS,
                value: value.clone(),
                reason: format!("{err}"),
            })?;
            if attempts == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_MAX_WRITE_ATTEMPTS,
                    value,
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_write_attempts = attempts;
        }

        if let Some(value) = read(ENV_STREAM) {
            config.stream = value;
        }

        config.api_endpoint = read(ENV_API_ENDPOINT).map(|value| value.trim_end_matches('/').to_string());
        config.db_path = read(ENV_DB_PATH).map(PathBuf::from);

        Ok(config)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for {key}: {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::{AlertManagerConfig, ConfigError, ENV_MAX_ACTIVE_ALERTS};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let config =
            AlertManagerConfig::from_lookup(lookup(&[("MAX_FIRING_ALERTS", "  ")])).unwrap();
        assert_eq!(config, AlertManagerConfig::default());
        assert_eq!(config.max_active_alerts, 5);
        assert_eq!(config.stream, "alerts");
    }

    #[test]
    fn overrides_are_read() {
        let config = AlertManagerConfig::from_lookup(lookup(&[
            ("MAX_FIRING_ALERTS", "2"),
            ("ALERTMANAGER_WRITE_ATTEMPTS", "9"),
            ("ALERTMANAGER_STREAM", "prod-alerts"),
            ("API_ENDPOINT", "https://alerts.example.com/"),
            ("ALERTMANAGER_DB", "/var/lib/alertmanager.db"),
        ]))
        .unwrap();

        assert_eq!(config.max_active_alerts, 2);
        assert_eq!(config.max_write_attempts, 9);
        assert_eq!(config.stream, "prod-alerts");
        assert_eq!(
            config.api_endpoint.as_deref(),
            Some("https://alerts.example.com")
        );
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/lib/alertmanager.db"))
        );
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = AlertManagerConfig::from_lookup(lookup(&[("MAX_FIRING_ALERTS", "five")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == ENV_MAX_ACTIVE_ALERTS
        ));

        assert!(
            AlertManagerConfig::from_lookup(lookup(&[("ALERTMANAGER_WRITE_ATTEMPTS", "0")]))
                .is_err()
        );
    }
}
