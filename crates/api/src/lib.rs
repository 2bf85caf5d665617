//! Driver Telemetry Dashboard API Server
//!
//! REST front end for the monitoring session: start/stop, alert cancel,
//! location sharing, trip analysis, and a Prometheus scrape endpoint.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use providers::{DriveSimulator, FixedLocationProvider, LocationProvider, SimulatedTraffic};
use risk_gateway::HeuristicGateway;
use serde::Serialize;
use session::{SessionController, SessionError, SessionHandle, SessionRunner};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use alerting::LogNotifier;

pub mod config;
mod error;
mod routes;

pub use config::{DashboardConfig, LoggingConfig};
pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    /// Command handle for the session runner
    pub session: SessionHandle,
    /// Prometheus recorder handle, if one is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session: SessionHandle, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            session,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub session: Option<SessionHealth>,
}

/// Session summary in the health response
#[derive(Debug, Serialize)]
pub struct SessionHealth {
    pub running: bool,
    pub ticks: u64,
    pub history_len: usize,
    pub assessment_in_flight: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/session", get(routes::session::get_session))
        .route("/api/v1/session/history", get(routes::session::get_history))
        .route("/api/v1/session/start", post(routes::session::start))
        .route("/api/v1/session/stop", post(routes::session::stop))
        .route("/api/v1/session/share", post(routes::session::toggle_share))
        .route(
            "/api/v1/session/alert/cancel",
            post(routes::session::cancel_alert),
        )
        .route(
            "/api/v1/session/analysis",
            get(routes::session::get_analysis).post(routes::session::request_analysis),
        )
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let session = match state.session.snapshot().await {
        Ok(snapshot) => Some(SessionHealth {
            running: snapshot.is_running,
            ticks: snapshot.ticks,
            history_len: snapshot.history_len,
            assessment_in_flight: snapshot.is_loading,
        }),
        Err(err) => {
            warn!("Health check could not reach session: {}", err);
            None
        }
    };

    let (code, status) = if session.is_some() {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        session,
    };

    (code, Json(response))
}

/// Prometheus scrape handler
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let level = config.max_level()?;
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Wire the session controller to its collaborators
pub fn build_session(config: &DashboardConfig) -> Result<(SessionRunner, SessionHandle), SessionError> {
    let controller = SessionController::new(
        config.session.clone(),
        Box::new(DriveSimulator::new(config.simulator.clone())),
        Box::new(LogNotifier::new()),
        config.contacts.clone(),
    )?;

    let location: Arc<dyn LocationProvider> = match config.location.device {
        Some(device) => Arc::new(FixedLocationProvider::new(device)),
        None => Arc::new(FixedLocationProvider::denied()),
    };

    Ok(SessionRunner::new(
        controller,
        Arc::new(HeuristicGateway::new(config.gateway.clone())),
        location,
        Arc::new(SimulatedTraffic::new()),
    ))
}

/// Run the server until Ctrl-C
pub async fn run_server(config: DashboardConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let (runner, session) = build_session(&config)?;
    let runner_task = tokio::spawn(runner.run());

    let state = Arc::new(AppState::new(session.clone(), Some(metrics)));
    let app = create_router(state);

    let addr = config.server.addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await?;

    session.shutdown().await.ok();
    runner_task.await?;
    Ok(())
}
