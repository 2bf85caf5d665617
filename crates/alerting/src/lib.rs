//! Alerting System
//!
//! Provides the alert escalation state machine (threshold trigger, cancellable
//! countdown, one-shot confirmation) and emergency contact notification.

mod contacts;
mod machine;

pub use contacts::{EmergencyContact, EmergencyNotifier, Escalation, LogNotifier};
pub use machine::{ActiveAlert, AlertConfig, AlertError, AlertPhase, AlertRecord, AlertState, AlertStateMachine};
