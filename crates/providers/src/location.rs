//! Device location provider

use async_trait::async_trait;
use sensor_model::Location;
use thiserror::Error;
use tracing::{info, warn};

/// Coordinate substituted when the device location cannot be read (New Delhi)
pub const FALLBACK_LOCATION: Location = Location::new(28.6139, 77.2090);

/// Location lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Permission to access location was denied")]
    PermissionDenied,

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the device's current position
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Result<Location, LocationError>;
}

/// Provider returning a configured coordinate, or denying access when none is set
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    location: Option<Location>,
}

impl FixedLocationProvider {
    pub fn new(location: Location) -> Self {
        info!(
            "Using fixed location {:.4}, {:.4}",
            location.latitude, location.longitude
        );
        Self {
            location: Some(location),
        }
    }

    /// Provider that behaves as if the user refused location permission
    pub fn denied() -> Self {
        Self { location: None }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_location(&self) -> Result<Location, LocationError> {
        match self.location {
            Some(location) => Ok(location),
            None => {
                warn!("Location permission denied");
                Err(LocationError::PermissionDenied)
            }
        }
    }
}
