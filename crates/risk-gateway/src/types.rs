//! Gateway result types

use event_classifier::EventCounts;
use serde::{Deserialize, Serialize};

/// Narrative attached to the neutral assessment used when the scorer fails
pub const UNAVAILABLE_ANALYSIS: &str = "AI service unavailable.";

/// Risk score for one sample. Superseded by the next tick, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Score in [0, 100]
    pub risk_score: u8,
    /// Short narrative explaining the score
    pub analysis: String,
}

impl RiskAssessment {
    /// Build an assessment, clamping the score into [0, 100]
    pub fn new(score: i64, analysis: impl Into<String>) -> Self {
        Self {
            risk_score: score.clamp(0, 100) as u8,
            analysis: analysis.into(),
        }
    }

    /// Neutral assessment substituted when the scorer cannot be reached
    pub fn service_unavailable() -> Self {
        Self::new(0, UNAVAILABLE_ANALYSIS)
    }
}

/// Trip-level driving pattern analysis
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrivingAnalysis {
    pub sudden_acceleration_events: u32,
    pub hard_braking_events: u32,
    pub sharp_turn_events: u32,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl DrivingAnalysis {
    /// Replace the event counts, keeping the narrative
    pub fn with_counts(mut self, counts: EventCounts) -> Self {
        self.sudden_acceleration_events = counts.sudden_acceleration;
        self.hard_braking_events = counts.hard_braking;
        self.sharp_turn_events = counts.sharp_turn;
        self
    }

    pub fn counts(&self) -> EventCounts {
        EventCounts {
            sudden_acceleration: self.sudden_acceleration_events,
            hard_braking: self.hard_braking_events,
            sharp_turn: self.sharp_turn_events,
        }
    }
}
