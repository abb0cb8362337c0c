use serde::{Deserialize, Serialize};

use super::{Finding, Severity};

pub const LOW_SEVERITY_WEIGHT: u32 = 1;
pub const MEDIUM_SEVERITY_WEIGHT: u32 = 3;
pub const HIGH_SEVERITY_WEIGHT: u32 = 5;

/// Aggregate score at which a reading is fraudulent even without a high-severity finding.
pub const FRAUD_SCORE_THRESHOLD: u32 = 4;

impl Severity {
    pub const fn weight(self) -> u32 {
        match self {
            Severity::Low => LOW_SEVERITY_WEIGHT,
            Severity::Medium => MEDIUM_SEVERITY_WEIGHT,
            Severity::High => HIGH_SEVERITY_WEIGHT,
        }
    }
}

/// Sum of severity weights over every finding, duplicates included.
pub fn score(findings: &[Finding]) -> u32 {
    findings
        .iter()
        .map(|finding| finding.severity.weight())
        .sum()
}

pub fn is_fraudulent(findings: &[Finding]) -> bool {
    findings
        .iter()
        .any(|finding| finding.severity == Severity::High)
        || score(findings) >= FRAUD_SCORE_THRESHOLD
}

/// Derived classification for a set of findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Verdict {
    pub score: u32,
    pub is_fraudulent: bool,
}

impl Verdict {
    pub fn from_findings(findings: &[Finding]) -> Self {
        Self {
            score: score(findings),
            is_fraudulent: is_fraudulent(findings),
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_fraudulent {
            "fraudulent"
        } else if self.score > 0 {
            "suspicious"
        } else {
            "clean"
        }
    }
}
