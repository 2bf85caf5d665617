//! Risk Assessment Gateway
//!
//! Boundary to the external risk scorer. The session controller only sees the
//! [`RiskGateway`] trait; [`HeuristicGateway`] is the rule-based stand-in used
//! when no remote scorer is wired in.

mod heuristic;
mod types;

pub use heuristic::{HeuristicConfig, HeuristicGateway};
pub use types::{DrivingAnalysis, RiskAssessment, UNAVAILABLE_ANALYSIS};

use async_trait::async_trait;
use sensor_model::{HistoryEntry, Sample};
use thiserror::Error;

/// Fewest history entries `summarize` accepts
pub const MIN_SUMMARY_ENTRIES: usize = 10;

/// Errors returned by a risk gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Risk service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Insufficient history: need {required} entries, got {actual}")]
    InsufficientData { required: usize, actual: usize },
}

/// External risk scoring service.
///
/// Calls are single-shot: implementations must not retry internally. The
/// caller decides what a failure degrades to.
#[async_trait]
pub trait RiskGateway: Send + Sync {
    /// Score a single sample
    async fn assess(&self, sample: &Sample) -> Result<RiskAssessment, GatewayError>;

    /// Summarize a trip. Callers must supply at least [`MIN_SUMMARY_ENTRIES`].
    async fn summarize(&self, history: &[HistoryEntry]) -> Result<DrivingAnalysis, GatewayError>;
}
