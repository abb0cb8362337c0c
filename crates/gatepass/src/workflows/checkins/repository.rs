use chrono::{DateTime, Utc};

use super::domain::{AlertId, CheckinId, CheckinRecord, FraudAlert, FraudNotification};

/// Storage abstraction for check-in records so the service can be exercised in isolation.
pub trait CheckinRepository: Send + Sync {
    fn insert(&self, record: CheckinRecord) -> Result<CheckinRecord, RepositoryError>;
    fn update(&self, record: CheckinRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &CheckinId) -> Result<Option<CheckinRecord>, RepositoryError>;
    /// Every check-in for the vehicle, most recently recorded first.
    fn history(&self, vehicle_number: &str) -> Result<Vec<CheckinRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<CheckinRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Alert records keyed by check-in, resolved by store supervisors.
pub trait AlertStore: Send + Sync {
    fn insert(&self, alert: FraudAlert) -> Result<(), AlertStoreError>;
    fn for_checkin(&self, checkin_id: &CheckinId) -> Result<Vec<FraudAlert>, AlertStoreError>;
    fn list(&self, unresolved_only: bool) -> Result<Vec<FraudAlert>, AlertStoreError>;
    fn resolve(&self, id: &AlertId, at: DateTime<Utc>) -> Result<FraudAlert, AlertStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AlertStoreError {
    #[error("alert not found")]
    NotFound,
    #[error("alert store unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for dashboards subscribed to live verdicts.
pub trait LiveNotifier: Send + Sync {
    fn publish(&self, notification: FraudNotification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
