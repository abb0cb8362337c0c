//! Odometer fraud detection.
//!
//! A [`FraudDetector`] runs an ordered battery of independent rules over a [`Reading`].
//! Rules whose inputs are missing are skipped, so detection never fails; it only yields
//! findings, from which a [`Verdict`] is derived.

mod config;
mod rules;
mod verdict;

pub use config::{
    DetectionThresholds, DEFAULT_ENTRY_WINDOW_SECS, DEFAULT_HISTORY_TOLERANCE_KM,
    DEFAULT_MAX_SPEED_KMH, DEFAULT_MAX_TRIP_KM, DEFAULT_ROUND_STEP_KM,
};
pub use rules::{default_rules, Rule, RuleCheck};
pub use verdict::{
    is_fraudulent, score, Verdict, FRAUD_SCORE_THRESHOLD, HIGH_SEVERITY_WEIGHT,
    LOW_SEVERITY_WEIGHT, MEDIUM_SEVERITY_WEIGHT,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Odometer and timestamp data for one check-in, paired with the vehicle's history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub vehicle_identifier: String,
    #[serde(default)]
    pub opening_distance: Option<f64>,
    #[serde(default)]
    pub closing_distance: Option<f64>,
    #[serde(default)]
    pub opening_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closing_timestamp: Option<DateTime<Utc>>,
    /// Earlier completed readings for the same vehicle, most recent first.
    #[serde(default)]
    pub prior_readings: Vec<PriorReading>,
}

impl Reading {
    pub fn new(vehicle_identifier: impl Into<String>) -> Self {
        Self {
            vehicle_identifier: vehicle_identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_distances(mut self, opening: Option<f64>, closing: Option<f64>) -> Self {
        self.opening_distance = opening;
        self.closing_distance = closing;
        self
    }

    pub fn with_timestamps(
        mut self,
        opening: Option<DateTime<Utc>>,
        closing: Option<DateTime<Utc>>,
    ) -> Self {
        self.opening_timestamp = opening;
        self.closing_timestamp = closing;
        self
    }

    pub fn with_prior_readings(mut self, prior_readings: Vec<PriorReading>) -> Self {
        self.prior_readings = prior_readings;
        self
    }

    pub(crate) fn distances(&self) -> Option<(f64, f64)> {
        Some((self.opening_distance?, self.closing_distance?))
    }

    /// Signed milliseconds from the opening entry to the closing entry.
    pub(crate) fn elapsed_millis(&self) -> Option<i64> {
        let opening = self.opening_timestamp?;
        let closing = self.closing_timestamp?;
        Some(closing.signed_duration_since(opening).num_milliseconds())
    }
}

/// Closing side of an earlier check-in for the same vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriorReading {
    #[serde(default)]
    pub closing_distance: Option<f64>,
    #[serde(default)]
    pub closing_timestamp: Option<DateTime<Utc>>,
}

impl PriorReading {
    pub fn closed_at(closing_distance: f64, closing_timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            closing_distance: Some(closing_distance),
            closing_timestamp,
        }
    }
}

/// Closed set of odometer anomalies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    SameKmReading,
    ReverseKmReading,
    UnrealisticDistance,
    SimultaneousKmEntry,
    KmInconsistency,
    RoundNumberPattern,
    UnrealisticSpeed,
}

impl FindingKind {
    pub const ALL: [FindingKind; 7] = [
        FindingKind::SameKmReading,
        FindingKind::ReverseKmReading,
        FindingKind::UnrealisticDistance,
        FindingKind::SimultaneousKmEntry,
        FindingKind::KmInconsistency,
        FindingKind::RoundNumberPattern,
        FindingKind::UnrealisticSpeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::SameKmReading => "SAME_KM_READING",
            FindingKind::ReverseKmReading => "REVERSE_KM_READING",
            FindingKind::UnrealisticDistance => "UNREALISTIC_DISTANCE",
            FindingKind::SimultaneousKmEntry => "SIMULTANEOUS_KM_ENTRY",
            FindingKind::KmInconsistency => "KM_INCONSISTENCY",
            FindingKind::RoundNumberPattern => "ROUND_NUMBER_PATTERN",
            FindingKind::UnrealisticSpeed => "UNREALISTIC_SPEED",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FindingKind::SameKmReading
            | FindingKind::ReverseKmReading
            | FindingKind::SimultaneousKmEntry => Severity::High,
            FindingKind::UnrealisticDistance
            | FindingKind::KmInconsistency
            | FindingKind::UnrealisticSpeed => Severity::Medium,
            FindingKind::RoundNumberPattern => Severity::Low,
        }
    }
}

impl std::fmt::Display for FindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// One triggered rule with its rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
        }
    }
}

/// Findings for one reading together with the verdict derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FraudAssessment {
    pub findings: Vec<Finding>,
    pub verdict: Verdict,
}

impl FraudAssessment {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let verdict = Verdict::from_findings(&findings);
        Self { findings, verdict }
    }

    pub fn flags(&self) -> Vec<FindingKind> {
        self.findings.iter().map(|finding| finding.kind).collect()
    }

    pub fn high_severity(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|finding| finding.severity == Severity::High)
    }
}

/// Stateless detector applying the rule registry to a reading.
#[derive(Debug, Clone)]
pub struct FraudDetector {
    thresholds: DetectionThresholds,
    rules: Vec<Rule>,
}

impl FraudDetector {
    pub fn new(thresholds: DetectionThresholds) -> Self {
        Self::with_rules(thresholds, default_rules())
    }

    /// Build a detector over a custom rule list, evaluated in the given order.
    pub fn with_rules(thresholds: DetectionThresholds, rules: Vec<Rule>) -> Self {
        Self { thresholds, rules }
    }

    pub fn thresholds(&self) -> &DetectionThresholds {
        &self.thresholds
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn detect(&self, reading: &Reading) -> Vec<Finding> {
        self.rules
            .iter()
            .filter_map(|rule| rule.evaluate(reading, &self.thresholds))
            .collect()
    }

    pub fn assess(&self, reading: &Reading) -> FraudAssessment {
        FraudAssessment::from_findings(self.detect(reading))
    }
}

impl Default for FraudDetector {
    fn default() -> Self {
        Self::new(DetectionThresholds::default())
    }
}
