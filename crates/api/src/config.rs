//! Dashboard Configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then
//! `DASHBOARD__*` environment variables (`__` separates nesting levels, e.g.
//! `DASHBOARD_SERVER__PORT=9090`).

use alerting::EmergencyContact;
use providers::SimulatorConfig;
use risk_gateway::HeuristicConfig;
use sensor_model::Location;
use serde::{Deserialize, Serialize};
use session::{SessionConfig, SessionError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

/// Default config file, read if present
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "DASHBOARD_CONFIG";

const ENV_PREFIX: &str = "DASHBOARD";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn, error (default: info)
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        self.level
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(self.level.clone()))
    }
}

/// Device location source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixed device position; unset behaves as a denied permission
    pub device: Option<Location>,
}

/// Top-level dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub location: LocationConfig,
    pub simulator: SimulatorConfig,
    pub gateway: HeuristicConfig,
    pub contacts: Vec<EmergencyContact>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            session: SessionConfig::default(),
            location: LocationConfig::default(),
            simulator: SimulatorConfig::default(),
            gateway: HeuristicConfig::default(),
            contacts: vec![
                EmergencyContact::new(1, "Jane Doe", "Spouse", "+1-555-0100"),
                EmergencyContact::new(2, "John Smith", "Friend", "+1-555-0101"),
            ],
        }
    }
}

impl DashboardConfig {
    /// Load configuration.
    ///
    /// `path` wins over `DASHBOARD_CONFIG`, which wins over `dashboard.toml`.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
        };

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DashboardConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.max_level()?;
        self.session.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("dashboard-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.contacts.len(), 2);
        assert!(config.location.device.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("dashboard-does-not-exist.toml");
        let config = DashboardConfig::load(Some(&path)).unwrap();
        assert_eq!(config.session.sample_period_ms, 2000);
        assert_eq!(config.session.alert.score_threshold, 70);
    }

    #[test]
    fn test_file_overrides_nested_fields() {
        let path = write_temp(
            r#"
[server]
port = 9090

[session]
sample_period_ms = 1000

[session.alert]
countdown_seconds = 5

[location.device]
latitude = 52.52
longitude = 13.405

[[contacts]]
id = 7
name = "Sam Lee"
relation = "Sibling"
phone = "+1-555-0199"
"#,
        );
        let config = DashboardConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.session.sample_period_ms, 1000);
        assert_eq!(config.session.history_capacity, 50);
        assert_eq!(config.session.alert.countdown_seconds, 5);
        assert_eq!(config.session.alert.score_threshold, 70);
        assert_eq!(config.location.device, Some(Location::new(52.52, 13.405)));
        assert_eq!(config.contacts.len(), 1);
        assert_eq!(config.contacts[0].name, "Sam Lee");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let path = write_temp("[session.alert]\ncountdown_seconds = 0\n");
        let result = DashboardConfig::load(Some(&path));
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Session(_))));

        let config = DashboardConfig {
            logging: LoggingConfig {
                level: "loud".to_string(),
                json: false,
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }
}
