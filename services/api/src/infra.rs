use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use gatepass::workflows::checkins::{
    AlertId, AlertStore, AlertStoreError, CheckinId, CheckinRecord, CheckinRepository,
    FraudAlert, FraudNotification, LiveNotifier, NotifyError, RepositoryError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::broadcast;
use tracing::debug;

/// Notifications buffered per dashboard subscriber before the slowest one lags.
const LIVE_FEED_CAPACITY: usize = 64;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryCheckinRepository {
    records: Arc<Mutex<HashMap<CheckinId, CheckinRecord>>>,
}

impl InMemoryCheckinRepository {
    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<CheckinId, CheckinRecord>>, RepositoryError>
    {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("check-in store lock poisoned".to_string()))
    }
}

impl CheckinRepository for InMemoryCheckinRepository {
    fn insert(&self, record: CheckinRecord) -> Result<CheckinRecord, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: CheckinRecord) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.id) {
            guard.insert(record.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &CheckinId) -> Result<Option<CheckinRecord>, RepositoryError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn history(&self, vehicle_number: &str) -> Result<Vec<CheckinRecord>, RepositoryError> {
        let guard = self.lock()?;
        let mut history: Vec<CheckinRecord> = guard
            .values()
            .filter(|record| record.vehicle_number == vehicle_number)
            .cloned()
            .collect();
        history.sort_by(|left, right| right.recorded_order(left));
        Ok(history)
    }

    fn all(&self) -> Result<Vec<CheckinRecord>, RepositoryError> {
        let mut records: Vec<CheckinRecord> = self.lock()?.values().cloned().collect();
        records.sort_by(|left, right| left.recorded_order(right));
        Ok(records)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAlertStore {
    alerts: Arc<Mutex<Vec<FraudAlert>>>,
}

impl InMemoryAlertStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<FraudAlert>>, AlertStoreError> {
        self.alerts
            .lock()
            .map_err(|_| AlertStoreError::Unavailable("alert store lock poisoned".to_string()))
    }
}

impl AlertStore for InMemoryAlertStore {
    fn insert(&self, alert: FraudAlert) -> Result<(), AlertStoreError> {
        self.lock()?.push(alert);
        Ok(())
    }

    fn for_checkin(&self, checkin_id: &CheckinId) -> Result<Vec<FraudAlert>, AlertStoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|alert| &alert.checkin_id == checkin_id)
            .cloned()
            .collect())
    }

    fn list(&self, unresolved_only: bool) -> Result<Vec<FraudAlert>, AlertStoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|alert| !unresolved_only || !alert.resolved)
            .cloned()
            .collect())
    }

    fn resolve(&self, id: &AlertId, at: DateTime<Utc>) -> Result<FraudAlert, AlertStoreError> {
        let mut guard = self.lock()?;
        let alert = guard
            .iter_mut()
            .find(|alert| &alert.id == id)
            .ok_or(AlertStoreError::NotFound)?;
        alert.resolved = true;
        alert.resolved_at = Some(at);
        Ok(alert.clone())
    }
}

/// Fans verdict summaries out to live dashboard subscribers.
#[derive(Clone)]
pub(crate) struct BroadcastNotifier {
    sender: broadcast::Sender<FraudNotification>,
}

impl BroadcastNotifier {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(LIVE_FEED_CAPACITY);
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<FraudNotification> {
        self.sender.subscribe()
    }
}

impl LiveNotifier for BroadcastNotifier {
    fn publish(&self, notification: FraudNotification) -> Result<(), NotifyError> {
        if self.sender.receiver_count() == 0 {
            debug!(checkin_id = %notification.checkin_id.0, "no live subscribers; notification dropped");
            return Ok(());
        }

        self.sender
            .send(notification)
            .map(|_| ())
            .map_err(|err| NotifyError::Transport(err.to_string()))
    }
}
