//! Session Controller
//!
//! Single owner of all mutable session state. Every transition happens in one
//! of the event methods below, each of which runs to completion before the
//! next event is handled:
//!
//! - commands: [`start`](SessionController::start),
//!   [`stop`](SessionController::stop),
//!   [`toggle_location_sharing`](SessionController::toggle_location_sharing),
//!   [`cancel_alert`](SessionController::cancel_alert),
//!   [`begin_analysis`](SessionController::begin_analysis)
//! - timer firings: [`on_timer`](SessionController::on_timer)
//! - async completions: [`on_assessment`](SessionController::on_assessment),
//!   [`on_traffic`](SessionController::on_traffic),
//!   [`finish_analysis`](SessionController::finish_analysis)
//!
//! The controller never awaits. Work that needs I/O is handed back to the
//! caller as a request carrying a ticket, and the completion is matched
//! against that ticket so results from an earlier session are dropped.

use crate::config::SessionConfig;
use crate::scheduler::{Scheduler, TimerKind, TimerToken};
use crate::SessionError;
use alerting::{AlertState, AlertStateMachine, EmergencyContact, EmergencyNotifier, Escalation};
use event_classifier::{classify, EventCounts};
use history_buffer::HistoryBuffer;
use providers::{LocationError, SampleGenerator, TrafficError, TrafficReport};
use risk_gateway::{DrivingAnalysis, GatewayError, RiskAssessment};
use sensor_model::{HistoryEntry, Location, Sample};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use trip_analysis::{AnalysisConfig, AnalysisError, TripAnalyzer};

/// Placeholder shown before the first session
pub const IDLE_MESSAGE: &str = "System Idle";

/// Placeholder shown after a session ends
pub const STOPPED_MESSAGE: &str = "Monitoring stopped. Analyze trip.";

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running { sharing_location: bool },
}

/// What the risk panel currently shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "assessment", rename_all = "snake_case")]
pub enum RiskStatus {
    /// No session running; carries the placeholder text
    Idle(String),
    /// Session running, no assessment received yet
    Awaiting,
    Assessed(RiskAssessment),
    /// Last gateway call failed; neutral score
    Unavailable(RiskAssessment),
}

impl RiskStatus {
    /// Score and text to display
    pub fn assessment(&self) -> RiskAssessment {
        match self {
            RiskStatus::Idle(message) => RiskAssessment::new(0, message.clone()),
            RiskStatus::Awaiting => RiskAssessment::new(0, "Waiting for first assessment"),
            RiskStatus::Assessed(assessment) | RiskStatus::Unavailable(assessment) => {
                assessment.clone()
            }
        }
    }
}

/// Trip analysis result slot
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum AnalysisStatus {
    #[default]
    NotRequested,
    Pending,
    Ready(DrivingAnalysis),
    Failed(String),
}

/// Identity of one risk assessment request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessTicket {
    epoch: u64,
    seq: u64,
}

/// Assessment the caller must run against the risk gateway
#[derive(Debug, Clone)]
pub struct AssessRequest {
    pub ticket: AssessTicket,
    pub sample: Sample,
}

/// Traffic lookup the caller must run
#[derive(Debug, Clone, Copy)]
pub struct TrafficRequest {
    pub epoch: u64,
    pub location: Location,
}

/// Trip analysis the caller must run
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub ticket: u64,
    pub history: Vec<HistoryEntry>,
    pub analyzer: TripAnalyzer,
}

/// Follow-up work produced by a timer firing
#[derive(Debug)]
pub enum TimerAction {
    None,
    Assess(AssessRequest),
    PollTraffic(TrafficRequest),
    /// Countdown reached zero; the session has already stopped
    Escalated(Escalation),
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: AssessTicket,
    location: Option<Location>,
}

/// Point-in-time view of the session for presentation
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub is_running: bool,
    pub is_loading: bool,
    pub ticks: u64,
    pub current_sample: Option<Sample>,
    pub risk: RiskAssessment,
    pub risk_status: RiskStatus,
    pub alert: AlertState,
    pub last_escalation: Option<Escalation>,
    pub location: Option<Location>,
    pub location_warning: Option<String>,
    pub traffic: Option<TrafficReport>,
    pub analysis: AnalysisStatus,
    pub history_len: usize,
    pub history_capacity: usize,
    pub live_events: EventCounts,
}

/// Monitoring session state machine
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    scheduler: Scheduler,
    history: HistoryBuffer,
    alert: AlertStateMachine,
    analyzer: TripAnalyzer,
    generator: Box<dyn SampleGenerator>,
    notifier: Box<dyn EmergencyNotifier>,
    contacts: Vec<EmergencyContact>,
    current: Option<Sample>,
    risk: RiskStatus,
    location: Option<Location>,
    location_warning: Option<String>,
    traffic: Option<TrafficReport>,
    traffic_in_flight: bool,
    analysis: AnalysisStatus,
    analysis_ticket: u64,
    last_escalation: Option<Escalation>,
    live_events: EventCounts,
    /// Bumped on every start and stop; stamps assessment and traffic requests
    epoch: u64,
    next_seq: u64,
    in_flight: Option<InFlight>,
    ticks: u64,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        generator: Box<dyn SampleGenerator>,
        notifier: Box<dyn EmergencyNotifier>,
        contacts: Vec<EmergencyContact>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        info!("Creating session controller with config: {:?}", config);

        let history = HistoryBuffer::new(config.history_capacity);
        let alert = AlertStateMachine::new(config.alert.clone());
        let analyzer = TripAnalyzer::new(AnalysisConfig {
            min_samples: config.min_analysis_samples,
        });

        Ok(Self {
            config,
            state: SessionState::Idle,
            scheduler: Scheduler::new(),
            history,
            alert,
            analyzer,
            generator,
            notifier,
            contacts,
            current: None,
            risk: RiskStatus::Idle(IDLE_MESSAGE.to_string()),
            location: None,
            location_warning: None,
            traffic: None,
            traffic_in_flight: false,
            analysis: AnalysisStatus::NotRequested,
            analysis_ticket: 0,
            last_escalation: None,
            live_events: EventCounts::default(),
            epoch: 0,
            next_seq: 0,
            in_flight: None,
            ticks: 0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running { .. })
    }

    pub fn is_sharing_location(&self) -> bool {
        matches!(
            self.state,
            SessionState::Running {
                sharing_location: true
            }
        )
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn alert(&self) -> &AlertState {
        self.alert.state()
    }

    pub fn risk(&self) -> &RiskStatus {
        &self.risk
    }

    pub fn analysis(&self) -> &AnalysisStatus {
        &self.analysis
    }

    pub fn location(&self) -> Option<Location> {
        self.location
    }

    pub fn location_warning(&self) -> Option<&str> {
        self.location_warning.as_deref()
    }

    pub fn traffic(&self) -> Option<&TrafficReport> {
        self.traffic.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn has_assessment_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Wait for the next timer firing
    pub async fn next_timer(&mut self) -> TimerToken {
        self.scheduler.next().await
    }

    /// Record the outcome of the device location lookup.
    ///
    /// A failure substitutes the fallback coordinate and keeps the error text
    /// as a user-visible warning.
    pub fn set_location(&mut self, result: Result<Location, LocationError>) {
        match result {
            Ok(location) => {
                debug!(
                    "Device location {:.4}, {:.4}",
                    location.latitude, location.longitude
                );
                self.location = Some(location);
                self.location_warning = None;
            }
            Err(err) => {
                let fallback = self.config.fallback_location;
                warn!(
                    "{}; using fallback location {:.4}, {:.4}",
                    err, fallback.latitude, fallback.longitude
                );
                self.location = Some(fallback);
                self.location_warning = Some(err.to_string());
            }
        }
    }

    /// Begin a new session, stopping any session already running
    pub fn start(&mut self) {
        self.stop();

        self.epoch += 1;
        self.history.clear();
        self.alert.reset();
        self.live_events = EventCounts::default();
        self.last_escalation = None;
        self.analysis_ticket += 1;
        self.analysis = AnalysisStatus::NotRequested;
        self.risk = RiskStatus::Awaiting;
        self.state = SessionState::Running {
            sharing_location: false,
        };
        self.ticks = 0;

        self.scheduler
            .arm(TimerKind::Sampling, self.config.sample_period());
        self.scheduler
            .arm(TimerKind::Traffic, self.config.traffic_period());

        metrics::gauge!("history_len").set(0.0);
        info!(
            "Monitoring started (sampling every {} ms)",
            self.config.sample_period_ms
        );
    }

    /// End the session. Idempotent.
    ///
    /// Buffered history is retained for trip analysis. A terminal alert stays
    /// visible until the next start; a running countdown is discarded.
    pub fn stop(&mut self) {
        let was_running = self.is_running();

        self.scheduler.cancel_all();
        self.epoch += 1;
        self.in_flight = None;
        self.traffic_in_flight = false;
        if self.alert.state().is_counting_down() {
            self.alert.reset();
        }
        self.state = SessionState::Idle;
        self.current = None;
        self.traffic = None;
        self.risk = RiskStatus::Idle(STOPPED_MESSAGE.to_string());

        if was_running {
            self.generator.reset();
            info!(
                "Monitoring stopped after {} ticks ({} of {} samples buffered)",
                self.ticks,
                self.history.len(),
                self.history.total_appended()
            );
        }
    }

    /// Flip location sharing. Returns the new flag, or `None` when idle.
    pub fn toggle_location_sharing(&mut self) -> Option<bool> {
        let SessionState::Running { sharing_location } = &mut self.state else {
            debug!("Location sharing toggle ignored while idle");
            return None;
        };
        *sharing_location = !*sharing_location;
        info!(
            "Location sharing {}",
            if *sharing_location { "enabled" } else { "disabled" }
        );
        Some(*sharing_location)
    }

    /// Cancel a running alert countdown. Returns `false` if none was running.
    pub fn cancel_alert(&mut self) -> bool {
        if !self.alert.cancel() {
            return false;
        }
        self.scheduler.cancel(TimerKind::Countdown);
        metrics::counter!("alerts_cancelled_total").increment(1);
        true
    }

    /// Dispatch a timer firing
    pub fn on_timer(&mut self, token: TimerToken) -> TimerAction {
        if !self.scheduler.is_current(token) {
            debug!("Dropping stale {:?} timer firing", token.kind());
            return TimerAction::None;
        }

        match token.kind() {
            TimerKind::Sampling => self
                .on_sample_tick()
                .map_or(TimerAction::None, TimerAction::Assess),
            TimerKind::Countdown => self
                .on_countdown_tick()
                .map_or(TimerAction::None, TimerAction::Escalated),
            TimerKind::Traffic => self
                .on_traffic_tick()
                .map_or(TimerAction::None, TimerAction::PollTraffic),
        }
    }

    /// Produce a sample, buffer it, and request an assessment unless one is
    /// already outstanding.
    pub fn on_sample_tick(&mut self) -> Option<AssessRequest> {
        if !self.is_running() {
            return None;
        }

        let sample = self.generator.next(self.location);
        let entry = sample.to_history_entry();
        self.history.append(entry);
        self.ticks += 1;

        let tags = classify(&entry);
        if !tags.is_empty() {
            for event in tags.events() {
                debug!("Detected {} at {}", event.as_str(), entry.timestamp_ms);
                metrics::counter!("motion_events_total", "event" => event.as_str()).increment(1);
            }
        }
        self.live_events.record(tags);

        metrics::counter!("session_ticks_total").increment(1);
        metrics::gauge!("history_len").set(self.history.len() as f64);

        self.current = Some(sample.clone());

        if let Some(pending) = &self.in_flight {
            debug!(
                "Assessment {} still outstanding, skipping tick {}",
                pending.ticket.seq, self.ticks
            );
            metrics::counter!("assessments_skipped_total").increment(1);
            return None;
        }

        self.next_seq += 1;
        let ticket = AssessTicket {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.in_flight = Some(InFlight {
            ticket,
            location: sample.location.or(self.location),
        });
        metrics::counter!("assessments_total").increment(1);

        Some(AssessRequest { ticket, sample })
    }

    /// Apply a risk gateway result. Returns `false` if the result was stale.
    pub fn on_assessment(
        &mut self,
        ticket: AssessTicket,
        result: Result<RiskAssessment, GatewayError>,
    ) -> bool {
        let Some(pending) = self.in_flight.filter(|p| p.ticket == ticket) else {
            debug!(
                "Discarding stale assessment (epoch {}, seq {})",
                ticket.epoch, ticket.seq
            );
            return false;
        };
        self.in_flight = None;

        let assessment = match result {
            Ok(assessment) => assessment,
            Err(err) => {
                warn!("Risk assessment failed: {}", err);
                metrics::counter!("assessment_failures_total").increment(1);
                self.risk = RiskStatus::Unavailable(RiskAssessment::service_unavailable());
                return true;
            }
        };

        debug!("Risk score {}: {}", assessment.risk_score, assessment.analysis);
        let score = assessment.risk_score;
        self.risk = RiskStatus::Assessed(assessment);

        if self.alert.exceeds_threshold(score)
            && !self.alert.state().is_counting_down()
            && self.alert.trigger(score, pending.location)
        {
            self.scheduler.arm(TimerKind::Countdown, COUNTDOWN_PERIOD);
            metrics::counter!("alerts_triggered_total").increment(1);
        }
        true
    }

    /// Advance the alert countdown; on confirmation dispatch the escalation
    /// and stop the session.
    pub fn on_countdown_tick(&mut self) -> Option<Escalation> {
        let record = self.alert.tick()?;
        self.scheduler.cancel(TimerKind::Countdown);

        let escalation = Escalation::new(&record, &self.contacts, self.is_sharing_location());
        self.notifier.notify(&escalation);
        metrics::counter!("alerts_confirmed_total").increment(1);

        self.last_escalation = Some(escalation.clone());
        self.stop();
        Some(escalation)
    }

    /// Request a traffic lookup unless one is already outstanding
    pub fn on_traffic_tick(&mut self) -> Option<TrafficRequest> {
        if !self.is_running() || self.traffic_in_flight {
            return None;
        }
        let location = self
            .current
            .as_ref()
            .and_then(|sample| sample.location)
            .or(self.location)?;

        self.traffic_in_flight = true;
        Some(TrafficRequest {
            epoch: self.epoch,
            location,
        })
    }

    /// Apply a traffic lookup. Failures keep the previous report.
    pub fn on_traffic(&mut self, epoch: u64, result: Result<TrafficReport, TrafficError>) -> bool {
        if epoch != self.epoch || !self.is_running() {
            debug!("Discarding traffic report from a previous session");
            return false;
        }
        self.traffic_in_flight = false;

        match result {
            Ok(report) => self.traffic = Some(report),
            Err(err) => warn!("Traffic lookup failed: {}", err),
        }
        true
    }

    /// Validate and snapshot the history for a trip analysis
    pub fn begin_analysis(&mut self) -> Result<AnalysisRequest, SessionError> {
        if self.is_running() {
            return Err(SessionError::MonitoringActive);
        }
        if self.analysis == AnalysisStatus::Pending {
            return Err(SessionError::AnalysisInProgress);
        }
        self.analyzer.check(self.history.len())?;

        self.analysis_ticket += 1;
        self.analysis = AnalysisStatus::Pending;
        info!("Trip analysis requested over {} samples", self.history.len());

        Ok(AnalysisRequest {
            ticket: self.analysis_ticket,
            history: self.history.snapshot(),
            analyzer: self.analyzer.clone(),
        })
    }

    /// Store a trip analysis result. Returns `false` if it was superseded.
    pub fn finish_analysis(
        &mut self,
        ticket: u64,
        result: Result<DrivingAnalysis, AnalysisError>,
    ) -> bool {
        if ticket != self.analysis_ticket || self.analysis != AnalysisStatus::Pending {
            debug!("Discarding superseded trip analysis {}", ticket);
            return false;
        }

        self.analysis = match result {
            Ok(analysis) => AnalysisStatus::Ready(analysis),
            Err(err) => AnalysisStatus::Failed(err.to_string()),
        };
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            is_running: self.is_running(),
            is_loading: self.in_flight.is_some(),
            ticks: self.ticks,
            current_sample: self.current.clone(),
            risk: self.risk.assessment(),
            risk_status: self.risk.clone(),
            alert: self.alert.state().clone(),
            last_escalation: self.last_escalation.clone(),
            location: self.location,
            location_warning: self.location_warning.clone(),
            traffic: self.traffic.clone(),
            analysis: self.analysis.clone(),
            history_len: self.history.len(),
            history_capacity: self.history.capacity(),
            live_events: self.live_events,
        }
    }
}
