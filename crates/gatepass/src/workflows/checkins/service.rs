use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::atomic::{self, AtomicU64};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    AlertId, CheckinId, CheckinRecord, CheckinStatus, CheckinSubmission, CheckoutReading,
    FraudAlert, FraudNotification,
};
use super::fraud::{
    DetectionThresholds, FindingKind, FraudAssessment, FraudDetector, PriorReading, Reading,
};
use super::report::FraudReport;
use super::repository::{
    AlertStore, AlertStoreError, CheckinRepository, LiveNotifier, RepositoryError,
};
use super::validation::{CheckinGuard, CheckinValidationError};

/// Completed check-ins handed to the detector as history.
const HISTORY_DEPTH: usize = 5;

static CHECKIN_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ALERT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_checkin_id() -> CheckinId {
    let id = CHECKIN_SEQUENCE.fetch_add(1, atomic::Ordering::Relaxed);
    CheckinId(format!("chk-{id:06}"))
}

fn next_alert_id() -> AlertId {
    let id = ALERT_SEQUENCE.fetch_add(1, atomic::Ordering::Relaxed);
    AlertId(format!("alert-{id:06}"))
}

/// Stored check-in plus the alerts raised while recording it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinOutcome {
    pub record: CheckinRecord,
    pub alerts: Vec<FraudAlert>,
}

/// Service composing validation, fraud detection, storage and live notification.
pub struct CheckinService<R, A> {
    guard: Arc<CheckinGuard>,
    repository: Arc<R>,
    alerts: Arc<A>,
    detector: Arc<FraudDetector>,
    notifier: Option<Arc<dyn LiveNotifier>>,
}

impl<R, A> CheckinService<R, A>
where
    R: CheckinRepository + 'static,
    A: AlertStore + 'static,
{
    pub fn new(repository: Arc<R>, alerts: Arc<A>, thresholds: DetectionThresholds) -> Self {
        Self {
            guard: Arc::new(CheckinGuard::default()),
            repository,
            alerts,
            detector: Arc::new(FraudDetector::new(thresholds)),
            notifier: None,
        }
    }

    pub fn with_guard(mut self, guard: CheckinGuard) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn LiveNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate and record a new check-in, raising alerts for high-severity findings.
    pub fn record(
        &self,
        submission: CheckinSubmission,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, CheckinServiceError> {
        self.guard.validate_submission(&submission, now)?;

        let history = self.prior_readings(&submission.vehicle_number, None)?;
        let CheckinSubmission {
            store_code,
            vehicle_number,
            driver_name,
            opening_km,
            closing_km,
            opening_at,
            closing_at,
        } = submission;

        let mut record = CheckinRecord {
            id: next_checkin_id(),
            store_code,
            vehicle_number,
            driver_name,
            opening_km,
            closing_km,
            opening_at,
            closing_at,
            status: CheckinRecord::status_for(closing_km),
            assessment: Default::default(),
            recorded_at: now,
        };
        record.assessment = self.detector.assess(&record.reading(history));

        // Alerts go first: an alert outage must not leave a stored check-in behind.
        let alerts = self.raise_alerts(&record, &BTreeSet::new(), now)?;
        let stored = self.repository.insert(record)?;
        info!(
            checkin_id = %stored.id.0,
            store = %stored.store_code,
            vehicle = %stored.vehicle_number,
            score = stored.assessment.verdict.score,
            "check-in recorded"
        );
        self.report_verdict(&stored, alerts.len());

        Ok(CheckinOutcome {
            record: stored,
            alerts,
        })
    }

    /// Attach the closing reading to an open check-in and re-run detection.
    pub fn close(
        &self,
        checkin_id: &CheckinId,
        checkout: CheckoutReading,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, CheckinServiceError> {
        self.guard.validate_checkout(&checkout, now)?;

        let mut record = self
            .repository
            .fetch(checkin_id)?
            .ok_or(RepositoryError::NotFound)?;
        if record.status == CheckinStatus::Closed {
            return Err(CheckinServiceError::AlreadyClosed(checkin_id.0.clone()));
        }

        record.closing_km = Some(checkout.closing_km);
        record.closing_at = Some(checkout.closing_at);
        record.status = CheckinStatus::Closed;

        let history = self.prior_readings(&record.vehicle_number, Some(&record))?;
        record.assessment = self.detector.assess(&record.reading(history));

        // The check-in stays open until its alerts are stored, so a failed close can be retried.
        let already_alerted: BTreeSet<FindingKind> = self
            .alerts
            .for_checkin(&record.id)?
            .into_iter()
            .map(|alert| alert.kind)
            .collect();
        let alerts = self.raise_alerts(&record, &already_alerted, now)?;

        self.repository.update(record.clone())?;
        info!(
            checkin_id = %record.id.0,
            score = record.assessment.verdict.score,
            "check-out recorded"
        );
        self.report_verdict(&record, alerts.len());

        Ok(CheckinOutcome { record, alerts })
    }

    /// Run detection on a caller-built reading without persisting anything.
    pub fn evaluate(&self, reading: &Reading) -> Result<FraudAssessment, CheckinServiceError> {
        self.guard.validate_reading(reading)?;
        Ok(self.detector.assess(reading))
    }

    pub fn get(&self, checkin_id: &CheckinId) -> Result<CheckinRecord, CheckinServiceError> {
        let record = self
            .repository
            .fetch(checkin_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn alerts(&self, unresolved_only: bool) -> Result<Vec<FraudAlert>, CheckinServiceError> {
        Ok(self.alerts.list(unresolved_only)?)
    }

    pub fn resolve_alert(
        &self,
        alert_id: &AlertId,
        now: DateTime<Utc>,
    ) -> Result<FraudAlert, CheckinServiceError> {
        let alert = self.alerts.resolve(alert_id, now)?;
        info!(alert_id = %alert.id.0, checkin_id = %alert.checkin_id.0, "fraud alert resolved");
        Ok(alert)
    }

    pub fn report(&self) -> Result<FraudReport, CheckinServiceError> {
        let records = self.repository.all()?;
        let alerts = self.alerts.list(false)?;
        Ok(FraudReport::build(&records, &alerts))
    }

    fn prior_readings(
        &self,
        vehicle_number: &str,
        current: Option<&CheckinRecord>,
    ) -> Result<Vec<PriorReading>, RepositoryError> {
        let mut history = self.repository.history(vehicle_number)?;
        history.sort_by(|left, right| right.recorded_order(left));
        Ok(history
            .iter()
            .filter(|earlier| earlier.status == CheckinStatus::Closed)
            .filter(|earlier| match current {
                Some(current) => earlier.recorded_order(current) == Ordering::Less,
                None => true,
            })
            .take(HISTORY_DEPTH)
            .map(CheckinRecord::as_prior)
            .collect())
    }

    fn raise_alerts(
        &self,
        record: &CheckinRecord,
        already_alerted: &BTreeSet<FindingKind>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FraudAlert>, AlertStoreError> {
        let mut raised = Vec::new();
        for finding in record.assessment.high_severity() {
            if already_alerted.contains(&finding.kind) {
                continue;
            }

            let alert = FraudAlert {
                id: next_alert_id(),
                checkin_id: record.id.clone(),
                store_code: record.store_code.clone(),
                vehicle_number: record.vehicle_number.clone(),
                kind: finding.kind,
                severity: finding.severity,
                message: finding.message.clone(),
                resolved: false,
                raised_at: now,
                resolved_at: None,
            };
            self.alerts.insert(alert.clone())?;
            raised.push(alert);
        }
        Ok(raised)
    }

    fn report_verdict(&self, record: &CheckinRecord, alerts_raised: usize) {
        let verdict = record.assessment.verdict;
        if verdict.is_fraudulent {
            warn!(
                checkin_id = %record.id.0,
                vehicle = %record.vehicle_number,
                score = verdict.score,
                flags = ?record.assessment.flags(),
                alerts_raised,
                "odometer reading flagged as fraudulent"
            );
        }

        let Some(notifier) = &self.notifier else {
            return;
        };
        let notification = FraudNotification {
            checkin_id: record.id.clone(),
            store_code: record.store_code.clone(),
            vehicle_number: record.vehicle_number.clone(),
            fraud_score: verdict.score,
            is_fraudulent: verdict.is_fraudulent,
            flags: record.assessment.flags(),
            alerts_raised,
        };
        if let Err(err) = notifier.publish(notification) {
            warn!(checkin_id = %record.id.0, error = %err, "live notification failed");
        }
    }
}

/// Error raised by the check-in service.
#[derive(Debug, thiserror::Error)]
pub enum CheckinServiceError {
    #[error(transparent)]
    Validation(#[from] CheckinValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Alert(#[from] AlertStoreError),
    #[error("check-in {0} is already closed")]
    AlreadyClosed(String),
}
