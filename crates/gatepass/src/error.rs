use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::checkins::{
    AlertStoreError, CheckinServiceError, ReportExportError, RepositoryError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Failures surfaced by the binaries: startup, CLI commands and HTTP handlers.
///
/// Listener and serve failures arrive as `std::io::Error` and land in `Io`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid reading payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("check-in error: {0}")]
    Checkin(#[from] CheckinServiceError),
    #[error("report export error: {0}")]
    Export(#[from] ReportExportError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Checkin(CheckinServiceError::Validation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Checkin(CheckinServiceError::Repository(RepositoryError::NotFound))
            | AppError::Checkin(CheckinServiceError::Alert(AlertStoreError::NotFound)) => {
                StatusCode::NOT_FOUND
            }
            AppError::Checkin(CheckinServiceError::AlreadyClosed(_))
            | AppError::Checkin(CheckinServiceError::Repository(RepositoryError::Conflict)) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
