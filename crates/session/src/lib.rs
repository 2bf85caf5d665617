//! Monitoring Session
//!
//! Owns the live monitoring session: the sampling timer, the history buffer,
//! risk gateway calls (at most one in flight), the alert countdown, and the
//! on-demand trip analysis.
//!
//! [`SessionController`] holds all session state and reacts to discrete
//! events (timer fired, assessment resolved, command received).
//! [`SessionRunner`] drives it on a tokio task, and [`SessionHandle`] is the
//! cloneable front door used by the HTTP layer.

mod config;
mod controller;
mod runner;
mod scheduler;

pub use config::SessionConfig;
pub use controller::{
    AnalysisRequest, AnalysisStatus, AssessRequest, AssessTicket, RiskStatus, SessionController,
    SessionSnapshot, SessionState, TimerAction, TrafficRequest, IDLE_MESSAGE, STOPPED_MESSAGE,
};
pub use runner::{SessionHandle, SessionRunner};
pub use scheduler::{Scheduler, TimerKind, TimerToken};

use alerting::AlertError;
use thiserror::Error;
use trip_analysis::AnalysisError;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InvalidAlertConfig(#[from] AlertError),

    #[error("Stop the current trip to enable analysis")]
    MonitoringActive,

    #[error("Trip analysis already in progress")]
    AnalysisInProgress,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Session runner has shut down")]
    RunnerClosed,
}
