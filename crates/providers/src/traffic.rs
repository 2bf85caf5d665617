//! Live traffic conditions provider

use crate::unit_noise;
use async_trait::async_trait;
use sensor_model::Location;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

/// Traffic lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrafficError {
    #[error("Traffic service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Coarse traffic state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficCondition {
    Flowing,
    Slow,
    Congested,
    Unknown,
}

/// Traffic around a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReport {
    pub condition: TrafficCondition,
    /// Average speed of surrounding traffic (km/h)
    pub average_speed: f64,
    pub description: String,
}

/// Source of live traffic conditions
#[async_trait]
pub trait TrafficProvider: Send + Sync {
    async fn conditions(&self, location: Location) -> Result<TrafficReport, TrafficError>;
}

/// Simulated traffic feed that drifts between conditions on each poll
#[derive(Debug, Default)]
pub struct SimulatedTraffic {
    polls: AtomicU64,
}

impl SimulatedTraffic {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrafficProvider for SimulatedTraffic {
    async fn conditions(&self, location: Location) -> Result<TrafficReport, TrafficError> {
        let poll = self.polls.fetch_add(1, Ordering::Relaxed);
        let noise = unit_noise((
            poll,
            location.latitude.to_bits(),
            location.longitude.to_bits(),
        ));

        let (condition, average_speed, description) = if noise < 0.5 {
            (TrafficCondition::Flowing, 45.0 + noise * 30.0, "Traffic is moving freely.")
        } else if noise < 0.8 {
            (TrafficCondition::Slow, 20.0 + noise * 10.0, "Moderate traffic, expect minor delays.")
        } else {
            (TrafficCondition::Congested, 5.0 + noise * 5.0, "Heavy congestion ahead.")
        };

        debug!("Traffic poll {}: {:?}", poll, condition);

        Ok(TrafficReport {
            condition,
            average_speed: average_speed.round(),
            description: description.to_string(),
        })
    }
}
