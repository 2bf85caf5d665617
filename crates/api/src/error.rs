//! API error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use session::SessionError;
use thiserror::Error;
use tracing::error;

/// Handler errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("No monitoring session is running")]
    NotRunning,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotRunning => StatusCode::CONFLICT,
            ApiError::Session(err) => match err {
                SessionError::MonitoringActive | SessionError::AnalysisInProgress => {
                    StatusCode::CONFLICT
                }
                SessionError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SessionError::RunnerClosed => StatusCode::SERVICE_UNAVAILABLE,
                SessionError::InvalidConfig(_) | SessionError::InvalidAlertConfig(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
