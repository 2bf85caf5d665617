//! Motion samples and their history projection

use crate::context::RoadContext;
use serde::{Deserialize, Serialize};

/// Three-axis reading (accelerometer in m/s², gyroscope in rad/s)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One reading produced per sampling tick. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub accel: Vector3,
    pub gyro: Vector3,
    /// Vehicle speed (km/h, never negative)
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub context: RoadContext,
}

impl Sample {
    /// Motion-only projection kept in the history buffer
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            timestamp_ms: self.timestamp_ms,
            accel: self.accel,
            gyro: self.gyro,
        }
    }
}

/// Retained subset of a sample for charting and trip analysis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp_ms: u64,
    pub accel: Vector3,
    pub gyro: Vector3,
}

impl HistoryEntry {
    pub fn new(timestamp_ms: u64, accel: Vector3, gyro: Vector3) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
        }
    }
}

impl From<&Sample> for HistoryEntry {
    fn from(sample: &Sample) -> Self {
        sample.to_history_entry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RoadClass, Weather};

    fn sample() -> Sample {
        Sample {
            timestamp_ms: 1_700_000_000_000,
            accel: Vector3::new(0.5, -3.2, 9.8),
            gyro: Vector3::new(0.0, 0.1, -1.4),
            speed: 62.0,
            location: Some(Location::new(28.6139, 77.2090)),
            context: RoadContext {
                weather: Weather::Rain,
                road_class: RoadClass::Urban,
            },
        }
    }

    #[test]
    fn test_history_projection_keeps_motion_fields() {
        let s = sample();
        let entry = HistoryEntry::from(&s);
        assert_eq!(entry.timestamp_ms, s.timestamp_ms);
        assert_eq!(entry.accel, s.accel);
        assert_eq!(entry.gyro, s.gyro);
    }

    #[test]
    fn test_context_serializes_variant_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["context"]["road_class"], "Urban");
        assert_eq!(json["context"]["weather"], "Rain");
    }

    #[test]
    fn test_absent_location_is_omitted() {
        let mut s = sample();
        s.location = None;
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("location").is_none());
    }
}
