//! Emergency contacts and escalation dispatch

use crate::machine::AlertRecord;
use sensor_model::{now_ms, Location};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Person notified when an alert is confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub id: u32,
    pub name: String,
    pub relation: String,
    pub phone: String,
}

impl EmergencyContact {
    pub fn new(id: u32, name: &str, relation: &str, phone: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            relation: relation.to_string(),
            phone: phone.to_string(),
        }
    }
}

/// Confirmed alert handed to the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub alert_id: Uuid,
    pub risk_score: u8,
    pub location: Option<Location>,
    /// Whether the driver had live location sharing switched on
    pub sharing_location: bool,
    pub contacts: Vec<EmergencyContact>,
    pub confirmed_at_ms: u64,
}

impl Escalation {
    pub fn new(record: &AlertRecord, contacts: &[EmergencyContact], sharing_location: bool) -> Self {
        Self {
            alert_id: record.id,
            risk_score: record.trigger_score,
            location: record.trigger_location,
            sharing_location,
            contacts: contacts.to_vec(),
            confirmed_at_ms: now_ms(),
        }
    }
}

/// Dispatches confirmed alerts. Called exactly once per confirmed alert.
pub trait EmergencyNotifier: Send {
    fn notify(&mut self, escalation: &Escalation);
}

/// Notifier that records the dispatch in the log (no network delivery)
#[derive(Debug, Default)]
pub struct LogNotifier {
    sent: usize,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escalations dispatched so far
    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl EmergencyNotifier for LogNotifier {
    fn notify(&mut self, escalation: &Escalation) {
        let location = escalation
            .location
            .map(|l| format!("{:.4}, {:.4}", l.latitude, l.longitude))
            .unwrap_or_else(|| "N/A".to_string());

        warn!(
            "EMERGENCY: alert {} confirmed (risk {}%, location {})",
            escalation.alert_id, escalation.risk_score, location
        );
        if escalation.contacts.is_empty() {
            warn!("No emergency contacts configured");
        }
        for contact in &escalation.contacts {
            info!(
                "Notifying {} ({}) at {}",
                contact.name, contact.relation, contact.phone
            );
        }
        self.sent += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_carries_alert_details() {
        let record = AlertRecord {
            id: Uuid::new_v4(),
            trigger_score: 88,
            trigger_location: Some(Location::new(1.0, 2.0)),
            triggered_at_ms: 0,
            remaining_seconds: 0,
        };
        let contacts = vec![EmergencyContact::new(1, "Jane Doe", "Spouse", "+1-555-0100")];
        let escalation = Escalation::new(&record, &contacts, true);

        assert_eq!(escalation.alert_id, record.id);
        assert_eq!(escalation.risk_score, 88);
        assert_eq!(escalation.contacts.len(), 1);
        assert!(escalation.sharing_location);
    }

    #[test]
    fn test_log_notifier_counts() {
        let mut notifier = LogNotifier::new();
        let escalation = Escalation {
            alert_id: Uuid::new_v4(),
            risk_score: 90,
            location: None,
            sharing_location: false,
            contacts: vec![],
            confirmed_at_ms: 0,
        };
        notifier.notify(&escalation);
        assert_eq!(notifier.sent(), 1);
    }
}
