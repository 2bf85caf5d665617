//! Session configuration

use crate::SessionError;
use alerting::AlertConfig;
use providers::FALLBACK_LOCATION;
use sensor_model::Location;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session configuration. Fixed once the controller is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sampling timer period in milliseconds (default: 2000)
    pub sample_period_ms: u64,
    /// Traffic poll period in milliseconds (default: 3000)
    pub traffic_poll_ms: u64,
    /// History buffer capacity (default: 50)
    pub history_capacity: usize,
    /// Fewest buffered samples a trip analysis accepts (default: 10)
    pub min_analysis_samples: usize,
    /// Coordinate used when the device location is unavailable
    pub fallback_location: Location,
    /// Alert threshold and countdown
    pub alert: AlertConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_period_ms: 2000,
            traffic_poll_ms: 3000,
            history_capacity: history_buffer::DEFAULT_CAPACITY,
            min_analysis_samples: risk_gateway::MIN_SUMMARY_ENTRIES,
            fallback_location: FALLBACK_LOCATION,
            alert: AlertConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    pub fn traffic_period(&self) -> Duration {
        Duration::from_millis(self.traffic_poll_ms)
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.sample_period_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "sample_period_ms must be > 0".to_string(),
            ));
        }
        if self.traffic_poll_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "traffic_poll_ms must be > 0".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(SessionError::InvalidConfig(
                "history_capacity must be > 0".to_string(),
            ));
        }
        if self.min_analysis_samples < risk_gateway::MIN_SUMMARY_ENTRIES {
            return Err(SessionError::InvalidConfig(format!(
                "min_analysis_samples ({}) is below the gateway minimum ({})",
                self.min_analysis_samples,
                risk_gateway::MIN_SUMMARY_ENTRIES
            )));
        }
        if self.min_analysis_samples > self.history_capacity {
            return Err(SessionError::InvalidConfig(format!(
                "min_analysis_samples ({}) exceeds history_capacity ({})",
                self.min_analysis_samples, self.history_capacity
            )));
        }
        self.alert.validate()?;
        Ok(())
    }
}
