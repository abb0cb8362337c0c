use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{AlertId, CheckinId, CheckinStatusView, CheckinSubmission, CheckoutReading};
use super::fraud::{Finding, Reading};
use super::repository::{AlertStore, AlertStoreError, CheckinRepository, RepositoryError};
use super::service::{CheckinOutcome, CheckinService, CheckinServiceError};

/// Router builder exposing check-in, alert and fraud evaluation endpoints.
pub fn checkin_router<R, A>(service: Arc<CheckinService<R, A>>) -> Router
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    Router::new()
        .route("/api/v1/checkins", post(record_handler::<R, A>))
        .route("/api/v1/checkins/:checkin_id", get(status_handler::<R, A>))
        .route(
            "/api/v1/checkins/:checkin_id/checkout",
            post(checkout_handler::<R, A>),
        )
        .route("/api/v1/alerts", get(alerts_handler::<R, A>))
        .route(
            "/api/v1/alerts/:alert_id/resolve",
            post(resolve_handler::<R, A>),
        )
        .route("/api/v1/fraud/evaluate", post(evaluate_handler::<R, A>))
        .route("/api/v1/fraud/report", get(report_handler::<R, A>))
        .with_state(service)
}

/// Verdict payload returned after a check-in is recorded or closed.
#[derive(Debug, Serialize)]
pub(crate) struct CheckinOutcomeView {
    pub(crate) checkin: CheckinStatusView,
    pub(crate) findings: Vec<Finding>,
    pub(crate) alerts_raised: usize,
}

impl From<CheckinOutcome> for CheckinOutcomeView {
    fn from(outcome: CheckinOutcome) -> Self {
        Self {
            checkin: outcome.record.status_view(),
            findings: outcome.record.assessment.findings,
            alerts_raised: outcome.alerts.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationView {
    pub(crate) findings: Vec<Finding>,
    pub(crate) score: u32,
    pub(crate) is_fraudulent: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlertQuery {
    #[serde(default)]
    pub(crate) unresolved: bool,
}

pub(crate) async fn record_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Json(submission): Json<CheckinSubmission>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.record(submission, Utc::now()) {
        Ok(outcome) => (StatusCode::CREATED, Json(CheckinOutcomeView::from(outcome))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn checkout_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Path(checkin_id): Path<String>,
    Json(checkout): Json<CheckoutReading>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.close(&CheckinId(checkin_id), checkout, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, Json(CheckinOutcomeView::from(outcome))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Path(checkin_id): Path<String>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.get(&CheckinId(checkin_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn alerts_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Query(query): Query<AlertQuery>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.alerts(query.unresolved) {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn resolve_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Path(alert_id): Path<String>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.resolve_alert(&AlertId(alert_id), Utc::now()) {
        Ok(alert) => (StatusCode::OK, Json(alert)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Stateless detection over a caller-supplied reading; nothing is persisted.
pub(crate) async fn evaluate_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
    Json(reading): Json<Reading>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.evaluate(&reading) {
        Ok(assessment) => {
            let view = EvaluationView {
                score: assessment.verdict.score,
                is_fraudulent: assessment.verdict.is_fraudulent,
                findings: assessment.findings,
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn report_handler<R, A>(
    State(service): State<Arc<CheckinService<R, A>>>,
) -> Response
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    match service.report() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: CheckinServiceError) -> Response {
    let status = match &err {
        CheckinServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckinServiceError::Repository(RepositoryError::NotFound)
        | CheckinServiceError::Alert(AlertStoreError::NotFound) => StatusCode::NOT_FOUND,
        CheckinServiceError::Repository(RepositoryError::Conflict)
        | CheckinServiceError::AlreadyClosed(_) => StatusCode::CONFLICT,
        CheckinServiceError::Repository(RepositoryError::Unavailable(_))
        | CheckinServiceError::Alert(AlertStoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
