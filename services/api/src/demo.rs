use crate::infra::{InMemoryAlertStore, InMemoryCheckinRepository};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use gatepass::config::AppConfig;
use gatepass::error::AppError;
use gatepass::workflows::checkins::{
    export_alerts_csv, CheckinGuard, CheckinOutcome, CheckinService, CheckinServiceError,
    CheckinSubmission, CheckoutReading, DetectionThresholds, Finding, FraudDetector, FraudReport,
    Reading,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// JSON file holding a single reading (distances, timestamps, prior readings)
    #[arg(long)]
    pub(crate) reading: PathBuf,
    /// Pretty-print the verdict
    #[arg(long)]
    pub(crate) pretty: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Write the alert CSV export to this path instead of stdout
    #[arg(long)]
    pub(crate) alerts_csv: Option<PathBuf>,
    /// Skip the alert CSV export
    #[arg(long)]
    pub(crate) skip_export: bool,
}

#[derive(Debug, Serialize)]
struct EvaluationOutput<'a> {
    vehicle_identifier: &'a str,
    score: u32,
    is_fraudulent: bool,
    verdict: &'static str,
    findings: &'a [Finding],
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let thresholds = AppConfig::load()?.detection;
    let raw = std::fs::read_to_string(&args.reading)?;
    let reading: Reading = serde_json::from_str(&raw)?;

    CheckinGuard::default()
        .validate_reading(&reading)
        .map_err(CheckinServiceError::from)?;
    let assessment = FraudDetector::new(thresholds).assess(&reading);
    let output = EvaluationOutput {
        vehicle_identifier: &reading.vehicle_identifier,
        score: assessment.verdict.score,
        is_fraudulent: assessment.verdict.is_fraudulent,
        verdict: assessment.verdict.label(),
        findings: &assessment.findings,
    };

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        alerts_csv,
        skip_export,
    } = args;

    let alerts = Arc::new(InMemoryAlertStore::default());
    let service = CheckinService::new(
        Arc::new(InMemoryCheckinRepository::default()),
        alerts,
        DetectionThresholds::default(),
    );

    let now = Utc::now();
    let day_one = now - Duration::days(2);
    let day_two = now - Duration::days(1);

    println!("Gate-pass fraud detection demo");
    println!("\nRecorded check-ins");

    let plausible = service.record(
        sample("BLR-014", "KA-01-AB-1234", 48_211.0, Some(48_262.5), day_one, 3),
        now,
    )?;
    render_outcome("plausible delivery round", &plausible);

    let rollback = service.record(
        sample("BLR-014", "KA-01-AB-1234", 48_230.0, Some(48_288.0), day_two, 2),
        now,
    )?;
    render_outcome("odometer behind last closing", &rollback);

    let copied = service.record(
        sample("BLR-022", "KA-03-MJ-5120", 7_700.0, Some(7_700.0), day_one, 1),
        now,
    )?;
    render_outcome("closing copied from opening", &copied);

    let long_haul = service.record(
        sample("MYS-002", "KA-09-XY-0042", 100.0, Some(700.0), day_two, 2),
        now,
    )?;
    render_outcome("long trip in two hours", &long_haul);

    let open = service.record(
        sample("MYS-002", "KA-09-XY-0100", 15_020.5, None, now - Duration::hours(1), 0),
        now,
    )?;
    let rushed_exit = service.close(
        &open.record.id,
        CheckoutReading {
            closing_km: 15_021.0,
            closing_at: now - Duration::hours(1) + Duration::seconds(20),
        },
        now,
    )?;
    render_outcome("gate exit seconds after entry", &rushed_exit);

    let report = service.report()?;
    render_report(&report);

    if skip_export {
        return Ok(());
    }

    let raised = service.alerts(false)?;
    match alerts_csv {
        Some(path) => {
            let writer = BufWriter::new(File::create(&path)?);
            export_alerts_csv(&raised, writer)?;
            println!("\nAlert export written to {}", path.display());
        }
        None => {
            println!("\nAlert export");
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            export_alerts_csv(&raised, &mut handle)?;
            handle.flush()?;
        }
    }

    Ok(())
}

fn sample(
    store_code: &str,
    vehicle_number: &str,
    opening_km: f64,
    closing_km: Option<f64>,
    opening_at: DateTime<Utc>,
    trip_hours: i64,
) -> CheckinSubmission {
    CheckinSubmission {
        store_code: store_code.to_string(),
        vehicle_number: vehicle_number.to_string(),
        driver_name: None,
        opening_km: Some(opening_km),
        closing_km,
        opening_at: Some(opening_at),
        closing_at: closing_km.map(|_| opening_at + Duration::hours(trip_hours)),
    }
}

fn render_outcome(label: &str, outcome: &CheckinOutcome) {
    let verdict = &outcome.record.assessment.verdict;
    println!(
        "- {} [{} / {}] {}: score {} ({}), {} alert(s)",
        outcome.record.id.0,
        outcome.record.store_code,
        outcome.record.vehicle_number,
        label,
        verdict.score,
        verdict.label(),
        outcome.alerts.len()
    );
    for finding in &outcome.record.assessment.findings {
        println!(
            "    {} [{}] {}",
            finding.kind,
            finding.severity.label(),
            finding.message
        );
    }
}

fn render_report(report: &FraudReport) {
    println!("\nFraud report");
    println!(
        "- Check-ins: {} ({} flagged, {:.0}% flag rate, average score {:.1})",
        report.total_checkins,
        report.flagged_checkins,
        report.flag_rate * 100.0,
        report.average_score
    );
    println!("- Unresolved alerts: {}", report.unresolved_alerts);
    match report.most_common_finding() {
        Some(kind) => println!("- Most common finding: {kind}"),
        None => println!("- Most common finding: none"),
    }

    println!("\nBy store");
    for store in &report.stores {
        println!(
            "- {}: {} check-in(s), {} flagged, {} open alert(s)",
            store.store_code, store.checkins, store.flagged, store.open_alerts
        );
    }
}
