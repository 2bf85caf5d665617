//! Synthetic drive simulator
//!
//! Stands in for vehicle hardware: produces one motion sample per call, with
//! occasional harsh events, a drifting position and rotating road context.
//! Values are pseudo-random but deterministic for a given seed.

use crate::unit_noise;
use sensor_model::{now_ms, Location, RoadClass, RoadContext, Sample, Vector3, Weather};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Meters per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Standard gravity (m/s²)
const GRAVITY: f64 = 9.81;

/// Producer of motion samples. Stateful across calls, opaque to the caller.
pub trait SampleGenerator: Send {
    /// Produce the next sample, seeding the position from `prior` if none is tracked yet
    fn next(&mut self, prior: Option<Location>) -> Sample;

    /// Restart the simulated drive
    fn reset(&mut self);
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for the pseudo-random stream
    pub seed: u64,
    /// Chance of a harsh event on any tick (0.0 - 1.0)
    pub event_probability: f64,
    /// Cruising speed the simulation drifts around (km/h)
    pub cruise_speed_kmh: f64,
    /// Simulated time between samples (seconds), used to advance the position
    pub step_seconds: f64,
    /// Heading in degrees clockwise from north
    pub heading_degrees: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            event_probability: 0.15,
            cruise_speed_kmh: 55.0,
            step_seconds: 2.0,
            heading_degrees: 45.0,
        }
    }
}

/// Harsh event injected into a sample
#[derive(Debug, Clone, Copy, PartialEq)]
enum Injected {
    None,
    HardBrake,
    Launch,
    SharpTurn,
}

/// Pseudo-random drive simulator
pub struct DriveSimulator {
    config: SimulatorConfig,
    tick: u64,
    speed_kmh: f64,
    position: Option<Location>,
}

impl DriveSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        info!(
            "Creating drive simulator (seed={:#x}, event_probability={})",
            config.seed, config.event_probability
        );
        let speed_kmh = config.cruise_speed_kmh;
        Self {
            config,
            tick: 0,
            speed_kmh,
            position: None,
        }
    }

    /// Number of samples produced since the last reset
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    fn noise(&self, channel: &str) -> f64 {
        unit_noise((self.config.seed, self.tick, channel))
    }

    /// Uniform value in [-1, 1)
    fn signed_noise(&self, channel: &str) -> f64 {
        self.noise(channel) * 2.0 - 1.0
    }

    fn pick_event(&self) -> Injected {
        if self.noise("event") >= self.config.event_probability {
            return Injected::None;
        }
        match (self.noise("event-kind") * 3.0) as u32 {
            0 => Injected::HardBrake,
            1 => Injected::Launch,
            _ => Injected::SharpTurn,
        }
    }

    fn context(&self) -> RoadContext {
        let weather_slot = (self.tick / 30) as usize;
        let road_slot = (self.tick / 15) as usize;
        let weather_idx = (unit_noise((self.config.seed, weather_slot, "weather"))
            * Weather::ALL.len() as f64) as usize;
        let road_idx = (unit_noise((self.config.seed, road_slot, "road"))
            * RoadClass::ALL.len() as f64) as usize;
        RoadContext {
            weather: Weather::ALL[weather_idx.min(Weather::ALL.len() - 1)],
            road_class: RoadClass::ALL[road_idx.min(RoadClass::ALL.len() - 1)],
        }
    }

    fn advance_position(&mut self, prior: Option<Location>) -> Option<Location> {
        let current = self.position.or(prior)?;
        let distance_m = self.speed_kmh / 3.6 * self.config.step_seconds;
        let heading = self.config.heading_degrees.to_radians();
        let d_lat = distance_m * heading.cos() / METERS_PER_DEGREE;
        let lat_scale = current.latitude.to_radians().cos().max(0.01);
        let d_lon = distance_m * heading.sin() / (METERS_PER_DEGREE * lat_scale);
        let next = Location::new(current.latitude + d_lat, current.longitude + d_lon);
        self.position = Some(next);
        Some(next)
    }
}

impl Default for DriveSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl SampleGenerator for DriveSimulator {
    fn next(&mut self, prior: Option<Location>) -> Sample {
        let event = self.pick_event();

        let mut accel = Vector3::new(
            self.signed_noise("accel-x") * 1.5,
            self.signed_noise("accel-y") * 3.0,
            GRAVITY + self.signed_noise("accel-z") * 0.3,
        );
        let mut gyro = Vector3::new(
            self.signed_noise("gyro-x") * 0.1,
            self.signed_noise("gyro-y") * 0.1,
            self.signed_noise("gyro-z") * 0.8,
        );

        // Drift speed back toward cruise
        let drift = (self.config.cruise_speed_kmh - self.speed_kmh) * 0.2;
        self.speed_kmh += drift + self.signed_noise("speed") * 4.0;

        match event {
            Injected::HardBrake => {
                accel.y = -(10.5 + self.noise("magnitude") * 3.5);
                self.speed_kmh -= 15.0;
            }
            Injected::Launch => {
                accel.y = 10.5 + self.noise("magnitude") * 2.5;
                self.speed_kmh += 10.0;
            }
            Injected::SharpTurn => {
                let sign = if self.noise("turn-dir") < 0.5 { -1.0 } else { 1.0 };
                gyro.z = sign * (2.2 + self.noise("magnitude") * 0.8);
                accel.x = sign * 4.0;
            }
            Injected::None => {}
        }
        self.speed_kmh = self.speed_kmh.clamp(0.0, 130.0);

        if event != Injected::None {
            debug!("Simulator injected {:?} at tick {}", event, self.tick);
        }

        let location = self.advance_position(prior);
        let context = self.context();
        let sample = Sample {
            timestamp_ms: now_ms(),
            accel,
            gyro,
            speed: (self.speed_kmh * 10.0).round() / 10.0,
            location,
            context,
        };

        self.tick += 1;
        sample
    }

    fn reset(&mut self) {
        debug!("Resetting drive simulator after {} ticks", self.tick);
        self.tick = 0;
        self.speed_kmh = self.config.cruise_speed_kmh;
        self.position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_physical() {
        let mut sim = DriveSimulator::default();
        for _ in 0..200 {
            let sample = sim.next(None);
            assert!(sample.speed >= 0.0);
            assert!(sample.accel.z > 9.0);
            assert!(sample.location.is_none());
        }
        assert_eq!(sim.ticks(), 200);
    }

    #[test]
    fn test_position_seeded_from_prior_and_moves() {
        let mut sim = DriveSimulator::default();
        let start = Location::new(28.6139, 77.2090);
        let first = sim.next(Some(start)).location.unwrap();
        let second = sim.next(Some(start)).location.unwrap();
        assert!(first.latitude > start.latitude);
        assert!(second.latitude > first.latitude);
    }

    #[test]
    fn test_events_injected() {
        let mut sim = DriveSimulator::new(SimulatorConfig {
            event_probability: 1.0,
            ..Default::default()
        });
        let harsh = (0..30)
            .map(|_| sim.next(None))
            .filter(|s| s.accel.y.abs() >= 10.0 || s.gyro.z.abs() > 2.0)
            .count();
        assert_eq!(harsh, 30);
    }

    #[test]
    fn test_reset_is_deterministic() {
        let mut sim = DriveSimulator::default();
        let first: Vec<f64> = (0..10).map(|_| sim.next(None).accel.y).collect();
        sim.reset();
        let second: Vec<f64> = (0..10).map(|_| sim.next(None).accel.y).collect();
        assert_eq!(first, second);
        assert_eq!(sim.ticks(), 10);
    }
}
