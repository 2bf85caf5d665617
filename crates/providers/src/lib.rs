//! External Providers
//!
//! Collaborators the session controller depends on but does not implement:
//! - Location provider (device position, may be denied)
//! - Traffic provider (live conditions around a coordinate)
//! - Sample generator (synthetic motion data in place of vehicle hardware)

pub mod location;
pub mod simulator;
pub mod traffic;

pub use location::{FixedLocationProvider, LocationError, LocationProvider, FALLBACK_LOCATION};
pub use simulator::{DriveSimulator, SampleGenerator, SimulatorConfig};
pub use traffic::{SimulatedTraffic, TrafficCondition, TrafficError, TrafficProvider, TrafficReport};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic pseudo-random value in [0, 1) derived from the given key
pub(crate) fn unit_noise<K: Hash>(key: K) -> f64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() >> 11) as f64 / (1u64 << 53) as f64
}
