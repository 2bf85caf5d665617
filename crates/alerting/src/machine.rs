//! Alert Escalation State Machine
//!
//! `Inactive -> CountingDown -> {Cancelled, Confirmed}`. The machine is driven
//! by discrete one-second ticks from the owner's scheduler; it never touches a
//! clock itself.

use sensor_model::{now_ms, Location};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Alert configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("Countdown must be at least one second")]
    ZeroCountdown,
    #[error("Score threshold {0} is outside [0, 100]")]
    ThresholdOutOfRange(u8),
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Risk score that must be exceeded (strictly) to trigger (default: 70)
    pub score_threshold: u8,
    /// Seconds before an untouched alert auto-confirms (default: 10)
    pub countdown_seconds: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            score_threshold: 70,
            countdown_seconds: 10,
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.countdown_seconds == 0 {
            return Err(AlertError::ZeroCountdown);
        }
        if self.score_threshold > 100 {
            return Err(AlertError::ThresholdOutOfRange(self.score_threshold));
        }
        Ok(())
    }
}

/// Phase tag of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertPhase {
    Inactive,
    CountingDown,
    Cancelled,
    Confirmed,
}

/// Alert whose countdown is running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub id: Uuid,
    pub remaining_seconds: u32,
    pub trigger_score: u8,
    pub trigger_location: Option<Location>,
    pub triggered_at_ms: u64,
}

/// Alert that reached a terminal phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub trigger_score: u8,
    pub trigger_location: Option<Location>,
    pub triggered_at_ms: u64,
    /// Countdown value when the alert left `CountingDown`
    pub remaining_seconds: u32,
}

impl From<&ActiveAlert> for AlertRecord {
    fn from(active: &ActiveAlert) -> Self {
        Self {
            id: active.id,
            trigger_score: active.trigger_score,
            trigger_location: active.trigger_location,
            triggered_at_ms: active.triggered_at_ms,
            remaining_seconds: active.remaining_seconds,
        }
    }
}

/// Current alert instance
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", content = "alert")]
pub enum AlertState {
    #[default]
    Inactive,
    CountingDown(ActiveAlert),
    Cancelled(AlertRecord),
    Confirmed(AlertRecord),
}

impl AlertState {
    pub fn phase(&self) -> AlertPhase {
        match self {
            AlertState::Inactive => AlertPhase::Inactive,
            AlertState::CountingDown(_) => AlertPhase::CountingDown,
            AlertState::Cancelled(_) => AlertPhase::Cancelled,
            AlertState::Confirmed(_) => AlertPhase::Confirmed,
        }
    }

    /// Seconds left on a running countdown
    pub fn remaining_seconds(&self) -> Option<u32> {
        match self {
            AlertState::CountingDown(active) => Some(active.remaining_seconds),
            _ => None,
        }
    }

    pub fn is_counting_down(&self) -> bool {
        matches!(self, AlertState::CountingDown(_))
    }
}

/// Alert escalation state machine
#[derive(Debug)]
pub struct AlertStateMachine {
    config: AlertConfig,
    state: AlertState,
}

impl AlertStateMachine {
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert state machine with config: {:?}", config);
        Self {
            config,
            state: AlertState::Inactive,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn phase(&self) -> AlertPhase {
        self.state.phase()
    }

    /// Whether a score is high enough to trigger (strictly above threshold)
    pub fn exceeds_threshold(&self, score: u8) -> bool {
        score > self.config.score_threshold
    }

    /// Start a fresh countdown.
    ///
    /// Returns `false` without touching the running countdown if one is
    /// already active. A terminal alert is replaced by the new instance.
    pub fn trigger(&mut self, score: u8, location: Option<Location>) -> bool {
        if let AlertState::CountingDown(active) = &self.state {
            debug!(
                "Alert {} already counting down ({}s left), ignoring score {}",
                active.id, active.remaining_seconds, score
            );
            return false;
        }

        let active = ActiveAlert {
            id: Uuid::new_v4(),
            remaining_seconds: self.config.countdown_seconds,
            trigger_score: score,
            trigger_location: location,
            triggered_at_ms: now_ms(),
        };
        warn!(
            "High-risk alert {} triggered: score {} > {}, confirming in {}s",
            active.id, score, self.config.score_threshold, active.remaining_seconds
        );
        self.state = AlertState::CountingDown(active);
        true
    }

    /// Advance the countdown by one second.
    ///
    /// Returns the confirmed alert on the tick that reaches zero; every other
    /// tick (including ticks outside `CountingDown`) returns `None`.
    pub fn tick(&mut self) -> Option<AlertRecord> {
        let AlertState::CountingDown(active) = &mut self.state else {
            return None;
        };

        active.remaining_seconds = active.remaining_seconds.saturating_sub(1);
        debug!("Alert {} countdown: {}s", active.id, active.remaining_seconds);

        if active.remaining_seconds > 0 {
            return None;
        }

        let record = AlertRecord::from(&*active);
        warn!("Alert {} confirmed (score {})", record.id, record.trigger_score);
        self.state = AlertState::Confirmed(record.clone());
        Some(record)
    }

    /// Cancel a running countdown. Returns `false` if none was running.
    pub fn cancel(&mut self) -> bool {
        let AlertState::CountingDown(active) = &self.state else {
            debug!("Cancel ignored in phase {:?}", self.phase());
            return false;
        };

        let record = AlertRecord::from(active);
        info!(
            "Alert {} cancelled with {}s remaining",
            record.id, record.remaining_seconds
        );
        self.state = AlertState::Cancelled(record);
        true
    }

    /// Return to `Inactive` (session start/stop only)
    pub fn reset(&mut self) {
        if self.state.is_counting_down() {
            debug!("Discarding running alert countdown on reset");
        }
        self.state = AlertState::Inactive;
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
