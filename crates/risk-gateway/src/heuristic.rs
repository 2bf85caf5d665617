//! Rule-based stand-in scorer

use crate::types::{DrivingAnalysis, RiskAssessment};
use crate::{GatewayError, RiskGateway, MIN_SUMMARY_ENTRIES};
use async_trait::async_trait;
use event_classifier::{EventCounts, HARD_BRAKING_ACCEL, SHARP_TURN_YAW_RATE, SUDDEN_ACCEL};
use sensor_model::{HistoryEntry, Sample};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Scoring weights for the heuristic gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Score before any contribution
    pub base_score: f64,
    /// Points added when longitudinal acceleration crosses an event threshold
    pub harsh_longitudinal_points: f64,
    /// Points added when yaw rate crosses the sharp-turn threshold
    pub sharp_turn_points: f64,
    /// Points per km/h above the road's nominal limit
    pub points_per_kmh_over: f64,
    /// Cap on the speeding contribution
    pub max_speeding_points: f64,
    /// Multiplier applied in rain, fog, or snow
    pub adverse_weather_factor: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            base_score: 5.0,
            harsh_longitudinal_points: 45.0,
            sharp_turn_points: 25.0,
            points_per_kmh_over: 0.8,
            max_speeding_points: 25.0,
            adverse_weather_factor: 1.2,
        }
    }
}

/// Heuristic risk gateway (no remote model)
pub struct HeuristicGateway {
    config: HeuristicConfig,
    /// When false every call fails with `ServiceUnavailable`
    available: AtomicBool,
}

impl HeuristicGateway {
    pub fn new(config: HeuristicConfig) -> Self {
        info!("Creating heuristic risk gateway");
        Self {
            config,
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the remote service going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(GatewayError::ServiceUnavailable(
                "heuristic gateway disabled".to_string(),
            ))
        }
    }

    fn score(&self, sample: &Sample) -> RiskAssessment {
        let cfg = &self.config;
        let longitudinal = sample.accel.y;
        let yaw_rate = sample.gyro.z.abs();
        let limit = sample.context.road_class.nominal_limit_kmh();
        let over_limit = (sample.speed - limit).max(0.0);

        let harsh_longitudinal = longitudinal <= HARD_BRAKING_ACCEL || longitudinal >= SUDDEN_ACCEL;
        let longitudinal_points = if harsh_longitudinal {
            cfg.harsh_longitudinal_points
        } else {
            longitudinal.abs() * 2.5
        };
        let turn_points = if yaw_rate > SHARP_TURN_YAW_RATE {
            cfg.sharp_turn_points
        } else {
            yaw_rate * 6.0
        };
        let speeding_points = (over_limit * cfg.points_per_kmh_over).min(cfg.max_speeding_points);

        let mut score = cfg.base_score + longitudinal_points + turn_points + speeding_points;
        if sample.context.weather.is_adverse() {
            score *= cfg.adverse_weather_factor;
        }

        let analysis = if harsh_longitudinal && longitudinal < 0.0 {
            "Severe deceleration detected. Possible collision or emergency stop."
        } else if harsh_longitudinal {
            "Aggressive acceleration detected. Ease off the throttle."
        } else if yaw_rate > SHARP_TURN_YAW_RATE {
            "Sharp turn at speed. Risk of loss of control."
        } else if over_limit > 0.0 {
            "Speed above the typical limit for this road."
        } else if sample.context.weather.is_adverse() {
            "Driving steady, but conditions are poor. Keep extra distance."
        } else {
            "Driving appears smooth and steady."
        };

        RiskAssessment::new(score.round() as i64, analysis)
    }
}

impl Default for HeuristicGateway {
    fn default() -> Self {
        Self::new(HeuristicConfig::default())
    }
}

#[async_trait]
impl RiskGateway for HeuristicGateway {
    async fn assess(&self, sample: &Sample) -> Result<RiskAssessment, GatewayError> {
        self.check_available()?;
        let assessment = self.score(sample);
        debug!(
            "Heuristic score {} (accel_y={:.2}, yaw={:.2}, speed={:.1})",
            assessment.risk_score, sample.accel.y, sample.gyro.z, sample.speed
        );
        Ok(assessment)
    }

    async fn summarize(&self, history: &[HistoryEntry]) -> Result<DrivingAnalysis, GatewayError> {
        if history.len() < MIN_SUMMARY_ENTRIES {
            warn!("Summarize rejected: {} entries", history.len());
            return Err(GatewayError::InsufficientData {
                required: MIN_SUMMARY_ENTRIES,
                actual: history.len(),
            });
        }
        self.check_available()?;

        let counts = EventCounts::from_entries(history);
        let summary = match counts.total() {
            0 => format!(
                "Smooth trip across {} samples with no harsh events.",
                history.len()
            ),
            n if n * 5 < history.len() as u32 => format!(
                "Mostly controlled driving with {} harsh event(s) across {} samples.",
                n,
                history.len()
            ),
            n => format!(
                "Aggressive driving pattern: {} harsh event(s) across {} samples.",
                n,
                history.len()
            ),
        };

        let mut recommendations = Vec::new();
        if counts.hard_braking > 0 {
            recommendations.push("Increase following distance to avoid hard braking.".to_string());
        }
        if counts.sudden_acceleration > 0 {
            recommendations.push("Accelerate gradually to save fuel and reduce wear.".to_string());
        }
        if counts.sharp_turn > 0 {
            recommendations.push("Slow down before entering turns.".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Keep up the smooth driving.".to_string());
        }

        Ok(DrivingAnalysis {
            summary,
            recommendations,
            ..Default::default()
        }
        .with_counts(counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_model::{RoadClass, RoadContext, Vector3, Weather};

    fn sample(accel_y: f64, gyro_z: f64, speed: f64, weather: Weather) -> Sample {
        Sample {
            timestamp_ms: 0,
            accel: Vector3::new(0.0, accel_y, 9.8),
            gyro: Vector3::new(0.0, 0.0, gyro_z),
            speed,
            location: None,
            context: RoadContext {
                weather,
                road_class: RoadClass::Urban,
            },
        }
    }

    #[tokio::test]
    async fn test_calm_sample_scores_low() {
        let gateway = HeuristicGateway::default();
        let result = gateway.assess(&sample(0.5, 0.1, 40.0, Weather::Clear)).await.unwrap();
        assert!(result.risk_score < 20);
    }

    #[tokio::test]
    async fn test_hard_braking_in_turn_crosses_alert_range() {
        let gateway = HeuristicGateway::default();
        let result = gateway.assess(&sample(-12.0, 2.5, 70.0, Weather::Rain)).await.unwrap();
        assert!(result.risk_score > 70);
        assert!(result.analysis.contains("deceleration"));
    }

    #[tokio::test]
    async fn test_unavailable_gateway_fails() {
        let gateway = HeuristicGateway::default();
        gateway.set_available(false);
        let err = gateway.assess(&sample(0.0, 0.0, 0.0, Weather::Clear)).await.unwrap_err();
        assert!(matches!(err, GatewayError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_summarize_rejects_short_history() {
        let gateway = HeuristicGateway::default();
        let history = vec![HistoryEntry::default(); 9];
        let err = gateway.summarize(&history).await.unwrap_err();
        assert_eq!(err, GatewayError::InsufficientData { required: 10, actual: 9 });
    }

    #[tokio::test]
    async fn test_summarize_counts_and_recommends() {
        let gateway = HeuristicGateway::default();
        let mut history = vec![HistoryEntry::default(); 10];
        history[3].accel.y = -11.0;
        history[7].gyro.z = 3.0;

        let analysis = gateway.summarize(&history).await.unwrap();
        assert_eq!(analysis.hard_braking_events, 1);
        assert_eq!(analysis.sharp_turn_events, 1);
        assert_eq!(analysis.sudden_acceleration_events, 0);
        assert_eq!(analysis.recommendations.len(), 2);
    }
}
