use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fraud::{FindingKind, FraudAssessment, PriorReading, Reading, Severity};

/// Identifier wrapper for recorded check-ins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckinId(pub String);

impl CheckinId {
    /// Numeric suffix of a generated id (`chk-000042` -> 42).
    pub fn sequence(&self) -> Option<u64> {
        let digits = self.0.rsplit('-').next()?;
        digits.parse().ok()
    }
}

/// Identifier wrapper for fraud alerts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertId(pub String);

/// Gate entry submitted by store staff for a delivery vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinSubmission {
    pub store_code: String,
    pub vehicle_number: String,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub opening_km: Option<f64>,
    #[serde(default)]
    pub closing_km: Option<f64>,
    #[serde(default)]
    pub opening_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closing_at: Option<DateTime<Utc>>,
}

/// Closing side of a check-in, recorded when the vehicle leaves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckoutReading {
    pub closing_km: f64,
    pub closing_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    Open,
    Closed,
}

impl CheckinStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckinStatus::Open => "open",
            CheckinStatus::Closed => "closed",
        }
    }
}

/// Persisted check-in with the fraud assessment computed when it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckinRecord {
    pub id: CheckinId,
    pub store_code: String,
    pub vehicle_number: String,
    pub driver_name: Option<String>,
    pub opening_km: Option<f64>,
    pub closing_km: Option<f64>,
    pub opening_at: Option<DateTime<Utc>>,
    pub closing_at: Option<DateTime<Utc>>,
    pub status: CheckinStatus,
    pub assessment: FraudAssessment,
    pub recorded_at: DateTime<Utc>,
}

impl CheckinRecord {
    pub fn status_for(closing_km: Option<f64>) -> CheckinStatus {
        if closing_km.is_some() {
            CheckinStatus::Closed
        } else {
            CheckinStatus::Open
        }
    }

    /// Closing side of this check-in as history for a later one.
    pub fn as_prior(&self) -> PriorReading {
        PriorReading {
            closing_distance: self.closing_km,
            closing_timestamp: self.closing_at,
        }
    }

    pub fn reading(&self, prior_readings: Vec<PriorReading>) -> Reading {
        Reading::new(self.vehicle_number.clone())
            .with_distances(self.opening_km, self.closing_km)
            .with_timestamps(self.opening_at, self.closing_at)
            .with_prior_readings(prior_readings)
    }

    /// Order in which check-ins were recorded: timestamp, then id sequence.
    pub fn recorded_order(&self, other: &CheckinRecord) -> Ordering {
        self.recorded_at
            .cmp(&other.recorded_at)
            .then_with(|| self.id.sequence().cmp(&other.id.sequence()))
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn is_flagged(&self) -> bool {
        self.assessment.verdict.is_fraudulent
    }

    pub fn status_view(&self) -> CheckinStatusView {
        CheckinStatusView {
            checkin_id: self.id.clone(),
            store_code: self.store_code.clone(),
            vehicle_number: self.vehicle_number.clone(),
            status: self.status.label(),
            fraud_score: self.assessment.verdict.score,
            is_fraudulent: self.assessment.verdict.is_fraudulent,
            fraud_flags: self.assessment.flags(),
        }
    }
}

/// Dashboard-facing summary of a check-in and its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinStatusView {
    pub checkin_id: CheckinId,
    pub store_code: String,
    pub vehicle_number: String,
    pub status: &'static str,
    pub fraud_score: u32,
    pub is_fraudulent: bool,
    pub fraud_flags: Vec<FindingKind>,
}

/// Alert raised for a high-severity finding on a check-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub id: AlertId,
    pub checkin_id: CheckinId,
    pub store_code: String,
    pub vehicle_number: String,
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    pub resolved: bool,
    pub raised_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Verdict summary pushed to live dashboard subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudNotification {
    pub checkin_id: CheckinId,
    pub store_code: String,
    pub vehicle_number: String,
    pub fraud_score: u32,
    pub is_fraudulent: bool,
    pub flags: Vec<FindingKind>,
    pub alerts_raised: usize,
}
