//! Road and weather context attached to each sample

use serde::{Deserialize, Serialize};
use std::fmt;

/// Weather reported alongside a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Cloudy,
    Rain,
    Fog,
    Snow,
}

impl Weather {
    /// All variants, in simulator rotation order
    pub const ALL: [Weather; 5] = [
        Weather::Clear,
        Weather::Cloudy,
        Weather::Rain,
        Weather::Fog,
        Weather::Snow,
    ];

    /// Whether the weather reduces grip or visibility
    pub fn is_adverse(&self) -> bool {
        matches!(self, Weather::Rain | Weather::Fog | Weather::Snow)
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Weather::Clear => "Clear",
            Weather::Cloudy => "Cloudy",
            Weather::Rain => "Rain",
            Weather::Fog => "Fog",
            Weather::Snow => "Snow",
        };
        f.write_str(s)
    }
}

/// Class of road the vehicle is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoadClass {
    Highway,
    #[default]
    Urban,
    Rural,
    Residential,
}

impl RoadClass {
    pub const ALL: [RoadClass; 4] = [
        RoadClass::Highway,
        RoadClass::Urban,
        RoadClass::Rural,
        RoadClass::Residential,
    ];

    /// Typical speed limit used by the heuristic scorer (km/h)
    pub fn nominal_limit_kmh(&self) -> f64 {
        match self {
            RoadClass::Highway => 100.0,
            RoadClass::Urban => 50.0,
            RoadClass::Rural => 80.0,
            RoadClass::Residential => 30.0,
        }
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoadClass::Highway => "Highway",
            RoadClass::Urban => "Urban",
            RoadClass::Rural => "Rural",
            RoadClass::Residential => "Residential",
        };
        f.write_str(s)
    }
}

/// Environment context of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoadContext {
    pub weather: Weather,
    pub road_class: RoadClass,
}
