//! Session runner task and command handle

use crate::controller::{
    AnalysisRequest, AssessRequest, AssessTicket, SessionController, SessionSnapshot, TimerAction,
    TrafficRequest,
};
use crate::SessionError;
use providers::{LocationProvider, TrafficError, TrafficProvider, TrafficReport};
use risk_gateway::{DrivingAnalysis, GatewayError, RiskAssessment, RiskGateway};
use sensor_model::HistoryEntry;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};
use trip_analysis::AnalysisError;

const COMMAND_BUFFER: usize = 32;

enum Command {
    Start(oneshot::Sender<SessionSnapshot>),
    Stop(oneshot::Sender<SessionSnapshot>),
    ToggleLocationSharing(oneshot::Sender<Option<bool>>),
    CancelAlert(oneshot::Sender<bool>),
    Analyze(oneshot::Sender<Result<(), SessionError>>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    History(usize, oneshot::Sender<Vec<HistoryEntry>>),
    Shutdown(oneshot::Sender<()>),
}

/// Spawned task whose output is matched back by key
struct Pending<K, T> {
    key: K,
    handle: JoinHandle<T>,
}

impl<K, T> Drop for Pending<K, T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn join_pending<K: Copy, T>(slot: &mut Option<Pending<K, T>>) -> (K, Result<T, JoinError>) {
    match slot {
        Some(pending) => {
            let result = (&mut pending.handle).await;
            (pending.key, result)
        }
        None => std::future::pending().await,
    }
}

/// Drives a [`SessionController`] on a tokio task
pub struct SessionRunner {
    controller: SessionController,
    gateway: Arc<dyn RiskGateway>,
    location: Arc<dyn LocationProvider>,
    traffic: Arc<dyn TrafficProvider>,
    commands: mpsc::Receiver<Command>,
    assessment: Option<Pending<AssessTicket, Result<RiskAssessment, GatewayError>>>,
    traffic_poll: Option<Pending<u64, Result<TrafficReport, TrafficError>>>,
    analysis: Option<Pending<u64, Result<DrivingAnalysis, AnalysisError>>>,
}

impl SessionRunner {
    pub fn new(
        controller: SessionController,
        gateway: Arc<dyn RiskGateway>,
        location: Arc<dyn LocationProvider>,
        traffic: Arc<dyn TrafficProvider>,
    ) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let runner = Self {
            controller,
            gateway,
            location,
            traffic,
            commands: rx,
            assessment: None,
            traffic_poll: None,
            analysis: None,
        };
        (runner, SessionHandle { tx })
    }

    /// Run until shut down or every handle is dropped
    pub async fn run(mut self) {
        info!("Starting session runner");
        let location = self.location.current_location().await;
        self.controller.set_location(location);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command) {
                            break;
                        }
                    }
                    None => {
                        debug!("All session handles dropped");
                        self.controller.stop();
                        break;
                    }
                },
                token = self.controller.next_timer() => {
                    let action = self.controller.on_timer(token);
                    self.handle_action(action);
                }
                (ticket, result) = join_pending(&mut self.assessment) => {
                    self.assessment = None;
                    let result = result.unwrap_or_else(|err| {
                        error!("Assessment task failed: {}", err);
                        Err(GatewayError::ServiceUnavailable(err.to_string()))
                    });
                    self.controller.on_assessment(ticket, result);
                }
                (epoch, result) = join_pending(&mut self.traffic_poll) => {
                    self.traffic_poll = None;
                    let result = result.unwrap_or_else(|err| {
                        Err(TrafficError::ServiceUnavailable(err.to_string()))
                    });
                    self.controller.on_traffic(epoch, result);
                }
                (ticket, result) = join_pending(&mut self.analysis) => {
                    self.analysis = None;
                    let result = result.unwrap_or_else(|err| {
                        error!("Analysis task failed: {}", err);
                        Err(AnalysisError::ServiceUnavailable(err.to_string()))
                    });
                    self.controller.finish_analysis(ticket, result);
                }
            }

            if !self.controller.is_running() {
                // Results from a stopped session are dropped anyway
                self.assessment = None;
                self.traffic_poll = None;
            }
        }

        info!("Session runner stopped");
    }

    /// Returns `false` once the runner should exit
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                self.analysis = None;
                self.controller.start();
                let _ = reply.send(self.controller.snapshot());
            }
            Command::Stop(reply) => {
                self.controller.stop();
                let _ = reply.send(self.controller.snapshot());
            }
            Command::ToggleLocationSharing(reply) => {
                let _ = reply.send(self.controller.toggle_location_sharing());
            }
            Command::CancelAlert(reply) => {
                let _ = reply.send(self.controller.cancel_alert());
            }
            Command::Analyze(reply) => {
                let result = self
                    .controller
                    .begin_analysis()
                    .map(|request| self.spawn_analysis(request));
                if let Err(err) = &result {
                    debug!("Trip analysis refused: {}", err);
                }
                let _ = reply.send(result);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::History(limit, reply) => {
                let _ = reply.send(self.controller.history().read_last(limit));
            }
            Command::Shutdown(reply) => {
                self.controller.stop();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn handle_action(&mut self, action: TimerAction) {
        match action {
            TimerAction::None => {}
            TimerAction::Assess(request) => self.spawn_assessment(request),
            TimerAction::PollTraffic(request) => self.spawn_traffic(request),
            TimerAction::Escalated(escalation) => {
                info!(
                    "Alert {} escalated to {} contacts",
                    escalation.alert_id,
                    escalation.contacts.len()
                );
            }
        }
    }

    fn spawn_assessment(&mut self, request: AssessRequest) {
        let gateway = Arc::clone(&self.gateway);
        let AssessRequest { ticket, sample } = request;
        let handle = tokio::spawn(async move { gateway.assess(&sample).await });
        self.assessment = Some(Pending { key: ticket, handle });
    }

    fn spawn_traffic(&mut self, request: TrafficRequest) {
        let traffic = Arc::clone(&self.traffic);
        let handle = tokio::spawn(async move { traffic.conditions(request.location).await });
        self.traffic_poll = Some(Pending {
            key: request.epoch,
            handle,
        });
    }

    fn spawn_analysis(&mut self, request: AnalysisRequest) {
        let gateway = Arc::clone(&self.gateway);
        let AnalysisRequest {
            ticket,
            history,
            analyzer,
        } = request;
        let handle =
            tokio::spawn(async move { analyzer.analyze(&history, gateway.as_ref()).await });
        self.analysis = Some(Pending {
            key: ticket,
            handle,
        });
    }
}

/// Cloneable handle for sending commands to a [`SessionRunner`]
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::RunnerClosed)?;
        reply_rx.await.map_err(|_| SessionError::RunnerClosed)
    }

    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Start).await
    }

    pub async fn stop(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Stop).await
    }

    /// Returns the new sharing flag, or `None` if no session is running
    pub async fn toggle_location_sharing(&self) -> Result<Option<bool>, SessionError> {
        self.request(Command::ToggleLocationSharing).await
    }

    /// Returns `false` if no countdown was running
    pub async fn cancel_alert(&self) -> Result<bool, SessionError> {
        self.request(Command::CancelAlert).await
    }

    /// Start a trip analysis. The result lands in the session snapshot.
    pub async fn analyze(&self) -> Result<(), SessionError> {
        self.request(Command::Analyze).await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Snapshot).await
    }

    /// The newest `limit` buffered entries, oldest first
    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>, SessionError> {
        self.request(|reply| Command::History(limit, reply)).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let result = self.request(Command::Shutdown).await;
        if result.is_err() {
            warn!("Session runner already stopped");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::controller::{AnalysisStatus, SessionState};
    use alerting::{AlertPhase, AlertState, EmergencyContact, EmergencyNotifier, Escalation};
    use async_trait::async_trait;
    use providers::{FixedLocationProvider, SampleGenerator, SimulatedTraffic};
    use sensor_model::{Location, RoadContext, Sample, Vector3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Gateway returning a high score on one chosen call
    struct ScriptedGateway {
        calls: AtomicUsize,
        spike_on: usize,
    }

    impl ScriptedGateway {
        fn spiking_on(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                spike_on: call,
            }
        }
    }

    #[async_trait]
    impl RiskGateway for ScriptedGateway {
        async fn assess(&self, _sample: &Sample) -> Result<RiskAssessment, GatewayError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.spike_on {
                Ok(RiskAssessment::new(85, "Erratic driving"))
            } else {
                Ok(RiskAssessment::new(20, "Normal"))
            }
        }

        async fn summarize(&self, _history: &[HistoryEntry]) -> Result<DrivingAnalysis, GatewayError> {
            Ok(DrivingAnalysis {
                summary: "Calm trip".to_string(),
                ..Default::default()
            })
        }
    }

    /// Gateway that never answers within the test
    #[derive(Default)]
    struct SlowGateway {
        calls: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl RiskGateway for SlowGateway {
        async fn assess(&self, _sample: &Sample) -> Result<RiskAssessment, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(RiskAssessment::new(10, "late"))
        }

        async fn summarize(&self, _history: &[HistoryEntry]) -> Result<DrivingAnalysis, GatewayError> {
            Err(GatewayError::ServiceUnavailable("unused".to_string()))
        }
    }

    struct FlatGenerator;

    impl SampleGenerator for FlatGenerator {
        fn next(&mut self, prior: Option<Location>) -> Sample {
            Sample {
                timestamp_ms: 0,
                accel: Vector3::new(0.0, 0.5, 9.81),
                gyro: Vector3::default(),
                speed: 50.0,
                location: prior,
                context: RoadContext::default(),
            }
        }

        fn reset(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Escalation>>>,
    }

    impl EmergencyNotifier for RecordingNotifier {
        fn notify(&mut self, escalation: &Escalation) {
            self.sent.lock().unwrap().push(escalation.clone());
        }
    }

    fn spawn_session(
        gateway: Arc<dyn RiskGateway>,
        location: FixedLocationProvider,
        notifier: RecordingNotifier,
    ) -> (SessionHandle, JoinHandle<()>) {
        let controller = SessionController::new(
            SessionConfig::default(),
            Box::new(FlatGenerator),
            Box::new(notifier),
            vec![EmergencyContact::new(1, "Jane Doe", "Spouse", "+1-555-0100")],
        )
        .unwrap();
        let (runner, handle) = SessionRunner::new(
            controller,
            gateway,
            Arc::new(location),
            Arc::new(SimulatedTraffic::new()),
        );
        (handle, tokio::spawn(runner.run()))
    }

    fn here() -> FixedLocationProvider {
        FixedLocationProvider::new(Location::new(52.52, 13.405))
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_score_counts_down_and_cancel_keeps_running() {
        let (handle, task) = spawn_session(
            Arc::new(ScriptedGateway::spiking_on(3)),
            here(),
            RecordingNotifier::default(),
        );
        handle.start().await.unwrap();

        // Ticks at 2s, 4s, 6s; the third assessment scores 85
        sleep_ms(6_500).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.alert.phase(), AlertPhase::CountingDown);
        assert_eq!(snapshot.alert.remaining_seconds(), Some(10));
        assert_eq!(snapshot.history_len, 3);

        // Countdown ticks at 7s, 8s, 9s, 10s
        sleep_ms(4_000).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.alert.remaining_seconds(), Some(6));

        assert!(handle.cancel_alert().await.unwrap());
        let snapshot = handle.snapshot().await.unwrap();
        match &snapshot.alert {
            AlertState::Cancelled(record) => assert_eq!(record.remaining_seconds, 6),
            other => panic!("unexpected alert state {:?}", other),
        }
        assert!(snapshot.is_running);

        // Sampling carries on after the cancel
        sleep_ms(4_000).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.history_len, 7);
        assert_eq!(snapshot.alert.phase(), AlertPhase::Cancelled);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_alert_confirms_and_stops() {
        let notifier = RecordingNotifier::default();
        let (handle, task) = spawn_session(
            Arc::new(ScriptedGateway::spiking_on(1)),
            here(),
            notifier.clone(),
        );
        handle.start().await.unwrap();
        assert_eq!(handle.toggle_location_sharing().await.unwrap(), Some(true));

        // Trigger at 2s, confirm at 12s
        sleep_ms(12_500).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Idle);
        assert_eq!(snapshot.alert.phase(), AlertPhase::Confirmed);
        let buffered = snapshot.history_len;

        sleep_ms(10_000).await;
        {
            let sent = notifier.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].risk_score, 85);
            assert!(sent[0].sharing_location);
            assert_eq!(sent[0].location, Some(Location::new(52.52, 13.405)));
        }
        // Stopped session does not keep sampling
        assert_eq!(handle.snapshot().await.unwrap().history_len, buffered);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_gateway_skips_ticks() {
        let gateway = Arc::new(SlowGateway::default());
        let (handle, task) = spawn_session(gateway.clone(), here(), RecordingNotifier::default());
        handle.start().await.unwrap();

        sleep_ms(10_500).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.history_len, 5);
        assert!(snapshot.is_loading);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_abandons_slow_assessment_and_restart_assesses_again() {
        let gateway = Arc::new(SlowGateway::default());
        let (handle, task) = spawn_session(gateway.clone(), here(), RecordingNotifier::default());
        handle.start().await.unwrap();

        sleep_ms(2_500).await;
        assert!(handle.snapshot().await.unwrap().is_loading);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        let stopped = handle.stop().await.unwrap();
        assert!(!stopped.is_loading);

        // Long enough for the abandoned call to have finished had it kept running
        sleep_ms(3_700_000).await;
        assert_eq!(gateway.finished.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        handle.start().await.unwrap();
        sleep_ms(2_500).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.history_len, 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_polled_while_running() {
        let (handle, task) = spawn_session(
            Arc::new(ScriptedGateway::spiking_on(usize::MAX)),
            here(),
            RecordingNotifier::default(),
        );
        handle.start().await.unwrap();
        sleep_ms(2_500).await;
        assert!(handle.snapshot().await.unwrap().traffic.is_none());

        // First poll at 3s
        sleep_ms(1_000).await;
        let report = handle.snapshot().await.unwrap().traffic.expect("traffic report");
        assert!(report.average_speed > 0.0);
        assert!(!report.description.is_empty());

        let stopped = handle.stop().await.unwrap();
        assert!(stopped.traffic.is_none());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_after_stop() {
        let (handle, task) = spawn_session(
            Arc::new(ScriptedGateway::spiking_on(usize::MAX)),
            here(),
            RecordingNotifier::default(),
        );
        handle.start().await.unwrap();
        assert_eq!(handle.analyze().await, Err(SessionError::MonitoringActive));

        // 9 samples
        sleep_ms(18_500).await;
        handle.stop().await.unwrap();
        assert!(matches!(
            handle.analyze().await,
            Err(SessionError::Analysis(AnalysisError::InsufficientData { .. }))
        ));

        // 10 samples
        handle.start().await.unwrap();
        sleep_ms(20_500).await;
        let stopped = handle.stop().await.unwrap();
        assert_eq!(stopped.history_len, 10);
        assert_eq!(handle.history(50).await.unwrap().len(), 10);
        let recent = handle.history(3).await.unwrap();
        assert_eq!(recent.len(), 3);

        handle.analyze().await.unwrap();
        sleep_ms(10).await;
        match handle.snapshot().await.unwrap().analysis {
            AnalysisStatus::Ready(analysis) => assert_eq!(analysis.summary, "Calm trip"),
            other => panic!("unexpected analysis status {:?}", other),
        }

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_location_falls_back() {
        let (handle, task) = spawn_session(
            Arc::new(ScriptedGateway::spiking_on(usize::MAX)),
            FixedLocationProvider::denied(),
            RecordingNotifier::default(),
        );

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.location, Some(Location::new(28.6139, 77.2090)));
        assert_eq!(
            snapshot.location_warning.as_deref(),
            Some("Permission to access location was denied")
        );

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.snapshot().await.unwrap_err(), SessionError::RunnerClosed);
    }
}
