//! Vehicle check-in intake, odometer fraud detection, and alerting.

pub mod domain;
pub mod fraud;
pub mod report;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    AlertId, CheckinId, CheckinRecord, CheckinStatus, CheckinStatusView, CheckinSubmission,
    CheckoutReading, FraudAlert, FraudNotification,
};
pub use fraud::{
    DetectionThresholds, Finding, FindingKind, FraudAssessment, FraudDetector, PriorReading,
    Reading, Severity, Verdict,
};
pub use report::{export_alerts_csv, FraudReport, ReportExportError, StoreFraudSummary};
pub use repository::{
    AlertStore, AlertStoreError, CheckinRepository, LiveNotifier, NotifyError, RepositoryError,
};
pub use router::checkin_router;
pub use service::{CheckinOutcome, CheckinService, CheckinServiceError};
pub use validation::{CheckinGuard, CheckinValidationError};
