//! Trip Analysis Aggregator
//!
//! Summarizes a history snapshot into harsh-event counts plus the gateway's
//! narrative and recommendations. Counts always come from the local
//! classifier; the gateway only contributes text.

use event_classifier::EventCounts;
use risk_gateway::{DrivingAnalysis, GatewayError, RiskGateway, MIN_SUMMARY_ENTRIES};
use sensor_model::HistoryEntry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Trip analysis errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("A minimum of {required} data points is required (have {actual})")]
    InsufficientData { required: usize, actual: usize },

    #[error("Summary service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<GatewayError> for AnalysisError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ServiceUnavailable(reason) => AnalysisError::ServiceUnavailable(reason),
            GatewayError::InsufficientData { required, actual } => {
                AnalysisError::InsufficientData { required, actual }
            }
        }
    }
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Fewest history entries an analysis accepts (default: 10)
    pub min_samples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_samples: MIN_SUMMARY_ENTRIES,
        }
    }
}

/// Trip analysis aggregator
#[derive(Debug, Clone, Default)]
pub struct TripAnalyzer {
    config: AnalysisConfig,
}

impl TripAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn min_samples(&self) -> usize {
        self.config.min_samples
    }

    /// Refuse histories below the minimum without calling the gateway
    pub fn check(&self, history_len: usize) -> Result<(), AnalysisError> {
        if history_len < self.config.min_samples {
            return Err(AnalysisError::InsufficientData {
                required: self.config.min_samples,
                actual: history_len,
            });
        }
        Ok(())
    }

    /// Analyze a history snapshot
    pub async fn analyze(
        &self,
        history: &[HistoryEntry],
        gateway: &dyn RiskGateway,
    ) -> Result<DrivingAnalysis, AnalysisError> {
        if let Err(err) = self.check(history.len()) {
            debug!("Trip analysis refused: {}", err);
            return Err(err);
        }

        let counts = EventCounts::from_entries(history);
        info!(
            "Analyzing trip: {} samples, {} hard braking, {} sudden accel, {} sharp turns",
            history.len(),
            counts.hard_braking,
            counts.sudden_acceleration,
            counts.sharp_turn
        );

        match gateway.summarize(history).await {
            Ok(narrative) => Ok(narrative.with_counts(counts)),
            Err(err) => {
                warn!("Failed to analyze trip: {}", err);
                Err(err.into())
            }
        }
    }
}
