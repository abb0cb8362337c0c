use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use super::domain::{CheckinRecord, FraudAlert};
use super::fraud::FindingKind;

/// Fraud summary across recorded check-ins for supervisors and periodic exports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudReport {
    pub total_checkins: usize,
    pub flagged_checkins: usize,
    pub flag_rate: f64,
    pub average_score: f64,
    pub findings_by_kind: BTreeMap<FindingKind, usize>,
    pub stores: Vec<StoreFraudSummary>,
    pub unresolved_alerts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreFraudSummary {
    pub store_code: String,
    pub checkins: usize,
    pub flagged: usize,
    pub open_alerts: usize,
}

impl FraudReport {
    pub fn build(records: &[CheckinRecord], alerts: &[FraudAlert]) -> Self {
        let total_checkins = records.len();
        let flagged_checkins = records.iter().filter(|record| record.is_flagged()).count();
        let total_score: u32 = records
            .iter()
            .map(|record| record.assessment.verdict.score)
            .sum();

        let mut findings_by_kind = BTreeMap::new();
        let mut stores: BTreeMap<&str, StoreFraudSummary> = BTreeMap::new();
        for record in records {
            for finding in &record.assessment.findings {
                *findings_by_kind.entry(finding.kind).or_insert(0) += 1;
            }

            let summary = store_entry(&mut stores, &record.store_code);
            summary.checkins += 1;
            if record.is_flagged() {
                summary.flagged += 1;
            }
        }

        let mut unresolved_alerts = 0;
        for alert in alerts.iter().filter(|alert| !alert.resolved) {
            unresolved_alerts += 1;
            store_entry(&mut stores, &alert.store_code).open_alerts += 1;
        }

        let (flag_rate, average_score) = if total_checkins == 0 {
            (0.0, 0.0)
        } else {
            (
                flagged_checkins as f64 / total_checkins as f64,
                f64::from(total_score) / total_checkins as f64,
            )
        };

        Self {
            total_checkins,
            flagged_checkins,
            flag_rate,
            average_score,
            findings_by_kind,
            stores: stores.into_values().collect(),
            unresolved_alerts,
        }
    }

    pub fn most_common_finding(&self) -> Option<FindingKind> {
        self.findings_by_kind
            .iter()
            .max_by(|left, right| left.1.cmp(right.1).then(right.0.cmp(left.0)))
            .map(|(kind, _)| *kind)
    }
}

fn store_entry<'m, 'a>(
    stores: &'m mut BTreeMap<&'a str, StoreFraudSummary>,
    store_code: &'a str,
) -> &'m mut StoreFraudSummary {
    stores
        .entry(store_code)
        .or_insert_with(|| StoreFraudSummary {
            store_code: store_code.to_string(),
            checkins: 0,
            flagged: 0,
            open_alerts: 0,
        })
}

#[derive(Debug, thiserror::Error)]
pub enum ReportExportError {
    #[error("failed to encode alert CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush alert CSV: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct AlertCsvRow<'a> {
    alert_id: &'a str,
    checkin_id: &'a str,
    store_code: &'a str,
    vehicle_number: &'a str,
    kind: &'static str,
    severity: &'static str,
    message: &'a str,
    raised_at: String,
    resolved: bool,
    resolved_at: String,
}

/// Write alerts as CSV, one row per alert with a header line.
pub fn export_alerts_csv<W: Write>(
    alerts: &[FraudAlert],
    writer: W,
) -> Result<(), ReportExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for alert in alerts {
        csv_writer.serialize(AlertCsvRow {
            alert_id: &alert.id.0,
            checkin_id: &alert.checkin_id.0,
            store_code: &alert.store_code,
            vehicle_number: &alert.vehicle_number,
            kind: alert.kind.as_str(),
            severity: alert.severity.label(),
            message: &alert.message,
            raised_at: alert.raised_at.to_rfc3339(),
            resolved: alert.resolved,
            resolved_at: alert
                .resolved_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
