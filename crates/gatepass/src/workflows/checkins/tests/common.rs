use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::checkins::domain::{
    AlertId, CheckinId, CheckinRecord, CheckinSubmission, FraudAlert, FraudNotification,
};
use crate::workflows::checkins::fraud::{DetectionThresholds, Finding, FindingKind, Reading};
use crate::workflows::checkins::repository::{
    AlertStore, AlertStoreError, CheckinRepository, LiveNotifier, NotifyError, RepositoryError,
};
use crate::workflows::checkins::{checkin_router, CheckinService};

pub(super) const VEHICLE: &str = "KA-01-AB-1234";
pub(super) const STORE: &str = "BLR-014";

pub(super) fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn reading(opening: f64, closing: f64) -> Reading {
    Reading::new(VEHICLE).with_distances(Some(opening), Some(closing))
}

pub(super) fn timed_reading(opening: f64, closing: f64, elapsed: Duration) -> Reading {
    let start = shift_start();
    reading(opening, closing).with_timestamps(Some(start), Some(start + elapsed))
}

pub(super) fn finding(kind: FindingKind) -> Finding {
    Finding::new(kind, format!("{kind} triggered"))
}

pub(super) fn kinds(findings: &[Finding]) -> Vec<FindingKind> {
    findings.iter().map(|finding| finding.kind).collect()
}

/// Closed check-in spanning a three-hour delivery round.
pub(super) fn submission(opening_km: f64, closing_km: f64) -> CheckinSubmission {
    CheckinSubmission {
        store_code: STORE.to_string(),
        vehicle_number: VEHICLE.to_string(),
        driver_name: Some("R. Kumar".to_string()),
        opening_km: Some(opening_km),
        closing_km: Some(closing_km),
        opening_at: Some(shift_start()),
        closing_at: Some(shift_start() + Duration::hours(3)),
    }
}

pub(super) fn open_submission(opening_km: f64, opening_at: DateTime<Utc>) -> CheckinSubmission {
    CheckinSubmission {
        store_code: STORE.to_string(),
        vehicle_number: VEHICLE.to_string(),
        driver_name: None,
        opening_km: Some(opening_km),
        closing_km: None,
        opening_at: Some(opening_at),
        closing_at: None,
    }
}

pub(super) fn build_service() -> (
    CheckinService<MemoryRepository, MemoryAlerts>,
    Arc<MemoryRepository>,
    Arc<MemoryAlerts>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let alerts = Arc::new(MemoryAlerts::default());
    let service = CheckinService::new(
        repository.clone(),
        alerts.clone(),
        DetectionThresholds::default(),
    );
    (service, repository, alerts)
}

pub(super) fn router_with_service(
    service: CheckinService<MemoryRepository, MemoryAlerts>,
) -> axum::Router {
    checkin_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<CheckinId, CheckinRecord>>>,
}

impl CheckinRepository for MemoryRepository {
    fn insert(&self, record: CheckinRecord) -> Result<CheckinRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: CheckinRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &CheckinId) -> Result<Option<CheckinRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn history(&self, vehicle_number: &str) -> Result<Vec<CheckinRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut history: Vec<CheckinRecord> = guard
            .values()
            .filter(|record| record.vehicle_number == vehicle_number)
            .cloned()
            .collect();
        history.sort_by(|left, right| right.recorded_order(left));
        Ok(history)
    }

    fn all(&self) -> Result<Vec<CheckinRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAlerts {
    alerts: Arc<Mutex<Vec<FraudAlert>>>,
}

impl MemoryAlerts {
    pub(super) fn stored(&self) -> Vec<FraudAlert> {
        self.alerts.lock().expect("alert mutex poisoned").clone()
    }
}

impl AlertStore for MemoryAlerts {
    fn insert(&self, alert: FraudAlert) -> Result<(), AlertStoreError> {
        self.alerts
            .lock()
            .expect("alert mutex poisoned")
            .push(alert);
        Ok(())
    }

    fn for_checkin(&self, checkin_id: &CheckinId) -> Result<Vec<FraudAlert>, AlertStoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        Ok(guard
            .iter()
            .filter(|alert| &alert.checkin_id == checkin_id)
            .cloned()
            .collect())
    }

    fn list(&self, unresolved_only: bool) -> Result<Vec<FraudAlert>, AlertStoreError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        Ok(guard
            .iter()
            .filter(|alert| !unresolved_only || !alert.resolved)
            .cloned()
            .collect())
    }

    fn resolve(&self, id: &AlertId, at: DateTime<Utc>) -> Result<FraudAlert, AlertStoreError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        let alert = guard
            .iter_mut()
            .find(|alert| &alert.id == id)
            .ok_or(AlertStoreError::NotFound)?;
        alert.resolved = true;
        alert.resolved_at = Some(at);
        Ok(alert.clone())
    }
}

/// Alert store whose writes fail while `offline` is set.
#[derive(Default)]
pub(super) struct FlakyAlerts {
    pub(super) inner: MemoryAlerts,
    offline: AtomicBool,
}

impl FlakyAlerts {
    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl AlertStore for FlakyAlerts {
    fn insert(&self, alert: FraudAlert) -> Result<(), AlertStoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AlertStoreError::Unavailable("alert queue unreachable".to_string()));
        }
        self.inner.insert(alert)
    }

    fn for_checkin(&self, checkin_id: &CheckinId) -> Result<Vec<FraudAlert>, AlertStoreError> {
        self.inner.for_checkin(checkin_id)
    }

    fn list(&self, unresolved_only: bool) -> Result<Vec<FraudAlert>, AlertStoreError> {
        self.inner.list(unresolved_only)
    }

    fn resolve(&self, id: &AlertId, at: DateTime<Utc>) -> Result<FraudAlert, AlertStoreError> {
        self.inner.resolve(id, at)
    }
}

pub(super) fn build_flaky_service() -> (
    CheckinService<MemoryRepository, FlakyAlerts>,
    Arc<MemoryRepository>,
    Arc<FlakyAlerts>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let alerts = Arc::new(FlakyAlerts::default());
    let service = CheckinService::new(
        repository.clone(),
        alerts.clone(),
        DetectionThresholds::default(),
    );
    (service, repository, alerts)
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    events: Arc<Mutex<Vec<FraudNotification>>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<FraudNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl LiveNotifier for RecordingNotifier {
    fn publish(&self, notification: FraudNotification) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl LiveNotifier for OfflineNotifier {
    fn publish(&self, _notification: FraudNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("no dashboard subscribers".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl CheckinRepository for UnavailableRepository {
    fn insert(&self, _record: CheckinRecord) -> Result<CheckinRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: CheckinRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &CheckinId) -> Result<Option<CheckinRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _vehicle_number: &str) -> Result<Vec<CheckinRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn all(&self) -> Result<Vec<CheckinRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
