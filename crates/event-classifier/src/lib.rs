//! Motion Event Classifier
//!
//! Classifies history entries against fixed thresholds:
//! - Hard braking: longitudinal acceleration at or below -10 m/s²
//! - Sudden acceleration: longitudinal acceleration at or above 10 m/s²
//! - Sharp turn: yaw rate magnitude above 2 rad/s
//!
//! Classification is pure and total. The trip analysis tallies tags across a
//! buffer snapshot with [`EventCounts`].

use sensor_model::HistoryEntry;
use serde::{Deserialize, Serialize};

/// Longitudinal acceleration at or below this is hard braking (m/s²)
pub const HARD_BRAKING_ACCEL: f64 = -10.0;

/// Longitudinal acceleration at or above this is sudden acceleration (m/s²)
pub const SUDDEN_ACCEL: f64 = 10.0;

/// Yaw rate magnitude strictly above this is a sharp turn (rad/s)
pub const SHARP_TURN_YAW_RATE: f64 = 2.0;

/// Driving event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionEvent {
    HardBraking,
    SuddenAcceleration,
    SharpTurn,
}

impl MotionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionEvent::HardBraking => "hard_braking",
            MotionEvent::SuddenAcceleration => "sudden_acceleration",
            MotionEvent::SharpTurn => "sharp_turn",
        }
    }
}

/// Tags matched by a single entry. The two acceleration tags never co-occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventTags {
    pub hard_braking: bool,
    pub sudden_acceleration: bool,
    pub sharp_turn: bool,
}

impl EventTags {
    pub fn is_empty(&self) -> bool {
        !(self.hard_braking || self.sudden_acceleration || self.sharp_turn)
    }

    pub fn contains(&self, event: MotionEvent) -> bool {
        match event {
            MotionEvent::HardBraking => self.hard_braking,
            MotionEvent::SuddenAcceleration => self.sudden_acceleration,
            MotionEvent::SharpTurn => self.sharp_turn,
        }
    }

    /// Matched events in a fixed order
    pub fn events(&self) -> Vec<MotionEvent> {
        [
            MotionEvent::HardBraking,
            MotionEvent::SuddenAcceleration,
            MotionEvent::SharpTurn,
        ]
        .into_iter()
        .filter(|e| self.contains(*e))
        .collect()
    }
}

/// Classify one entry
pub fn classify(entry: &HistoryEntry) -> EventTags {
    EventTags {
        hard_braking: entry.accel.y <= HARD_BRAKING_ACCEL,
        sudden_acceleration: entry.accel.y >= SUDDEN_ACCEL,
        sharp_turn: entry.gyro.z.abs() > SHARP_TURN_YAW_RATE,
    }
}

/// Per-kind event tally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounts {
    pub sudden_acceleration: u32,
    pub hard_braking: u32,
    pub sharp_turn: u32,
}

impl EventCounts {
    /// Classify and tally every entry
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a HistoryEntry>,
    {
        let mut counts = Self::default();
        for entry in entries {
            counts.record(classify(entry));
        }
        counts
    }

    pub fn record(&mut self, tags: EventTags) {
        self.hard_braking += tags.hard_braking as u32;
        self.sudden_acceleration += tags.sudden_acceleration as u32;
        self.sharp_turn += tags.sharp_turn as u32;
    }

    pub fn total(&self) -> u32 {
        self.hard_braking + self.sudden_acceleration + self.sharp_turn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sensor_model::Vector3;

    fn entry(accel_y: f64, gyro_z: f64) -> HistoryEntry {
        HistoryEntry::new(0, Vector3::new(0.0, accel_y, 9.8), Vector3::new(0.0, 0.0, gyro_z))
    }

    #[test]
    fn test_hard_braking_boundary() {
        assert!(classify(&entry(-10.0, 0.0)).hard_braking);
        assert!(!classify(&entry(-9.999, 0.0)).hard_braking);
        assert!(classify(&entry(-14.2, 0.0)).hard_braking);
    }

    #[test]
    fn test_sudden_acceleration_boundary() {
        assert!(classify(&entry(10.0, 0.0)).sudden_acceleration);
        assert!(!classify(&entry(9.999, 0.0)).sudden_acceleration);
    }

    #[test]
    fn test_sharp_turn_is_strict() {
        assert!(!classify(&entry(0.0, 2.0)).sharp_turn);
        assert!(classify(&entry(0.0, 2.01)).sharp_turn);
        assert!(classify(&entry(0.0, -2.01)).sharp_turn);
        assert!(!classify(&entry(0.0, -2.0)).sharp_turn);
    }

    #[test]
    fn test_turn_co_occurs_with_braking() {
        let tags = classify(&entry(-11.0, 3.0));
        assert_eq!(tags.events(), vec![MotionEvent::HardBraking, MotionEvent::SharpTurn]);
    }

    #[test]
    fn test_quiet_entry_has_no_tags() {
        assert!(classify(&entry(1.5, 0.3)).is_empty());
    }

    #[test]
    fn test_counts_over_entries() {
        let entries = [
            entry(-12.0, 0.0),
            entry(11.0, 2.5),
            entry(0.0, -2.2),
            entry(0.0, 0.0),
            entry(-10.0, 0.0),
        ];
        let counts = EventCounts::from_entries(&entries);
        assert_eq!(counts.hard_braking, 2);
        assert_eq!(counts.sudden_acceleration, 1);
        assert_eq!(counts.sharp_turn, 2);
        assert_eq!(counts.total(), 5);
    }

    proptest! {
        #[test]
        fn prop_accel_tags_exclusive(accel_y in -50.0f64..50.0, gyro_z in -10.0f64..10.0) {
            let tags = classify(&entry(accel_y, gyro_z));
            prop_assert!(!(tags.hard_braking && tags.sudden_acceleration));
        }
    }
}
