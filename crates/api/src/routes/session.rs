//! Session Routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use sensor_model::HistoryEntry;
use serde::{Deserialize, Serialize};
use session::{AnalysisStatus, SessionSnapshot};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Most recent entries to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for the history endpoint
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Oldest first
    pub data: Vec<HistoryEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub sharing_location: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.snapshot().await?))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let data = state.session.history(params.limit).await?;
    Ok(Json(HistoryResponse {
        count: data.len(),
        data,
    }))
}

pub async fn start(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.start().await?))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(state.session.stop().await?))
}

pub async fn toggle_share(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ShareResponse>, ApiError> {
    let sharing_location = state
        .session
        .toggle_location_sharing()
        .await?
        .ok_or(ApiError::NotRunning)?;
    Ok(Json(ShareResponse { sharing_location }))
}

pub async fn cancel_alert(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.session.cancel_alert().await?;
    Ok(Json(CancelResponse { cancelled }))
}

/// Start a trip analysis; poll `GET /analysis` for the result
pub async fn request_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<AnalysisStatus>), ApiError> {
    state.session.analyze().await?;
    Ok((StatusCode::ACCEPTED, Json(AnalysisStatus::Pending)))
}

pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisStatus>, ApiError> {
    Ok(Json(state.session.snapshot().await?.analysis))
}
