use super::config::DetectionThresholds;
use super::{Finding, FindingKind, Reading};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Signature shared by every odometer rule.
pub type RuleCheck = fn(&Reading, &DetectionThresholds) -> Option<Finding>;

/// Registry entry pairing a finding kind with the check that produces it.
#[derive(Clone, Copy)]
pub struct Rule {
    kind: FindingKind,
    check: RuleCheck,
}

impl Rule {
    pub const fn new(kind: FindingKind, check: RuleCheck) -> Self {
        Self { kind, check }
    }

    pub fn kind(&self) -> FindingKind {
        self.kind
    }

    pub fn evaluate(&self, reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
        (self.check)(reading, thresholds)
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("kind", &self.kind).finish()
    }
}

/// The standard battery in evaluation order.
pub fn default_rules() -> Vec<Rule> {
    vec![
        Rule::new(FindingKind::SameKmReading, same_km_reading),
        Rule::new(FindingKind::ReverseKmReading, reverse_km_reading),
        Rule::new(FindingKind::UnrealisticDistance, unrealistic_distance),
        Rule::new(FindingKind::SimultaneousKmEntry, simultaneous_km_entry),
        Rule::new(FindingKind::KmInconsistency, km_inconsistency),
        Rule::new(FindingKind::RoundNumberPattern, round_number_pattern),
        Rule::new(FindingKind::UnrealisticSpeed, unrealistic_speed),
    ]
}

fn same_km_reading(reading: &Reading, _: &DetectionThresholds) -> Option<Finding> {
    let (opening, closing) = reading.distances()?;
    (opening == closing).then(|| {
        Finding::new(
            FindingKind::SameKmReading,
            format!("Opening KM ({opening}) and Closing KM ({closing}) are identical"),
        )
    })
}

fn reverse_km_reading(reading: &Reading, _: &DetectionThresholds) -> Option<Finding> {
    let (opening, closing) = reading.distances()?;
    (closing < opening).then(|| {
        Finding::new(
            FindingKind::ReverseKmReading,
            format!("Closing KM ({closing}) is less than Opening KM ({opening})"),
        )
    })
}

fn unrealistic_distance(reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
    let (opening, closing) = reading.distances()?;
    let travelled = closing - opening;
    (travelled > thresholds.max_trip_km).then(|| {
        Finding::new(
            FindingKind::UnrealisticDistance,
            format!("KM difference ({travelled}km) seems unrealistic for a single trip"),
        )
    })
}

fn simultaneous_km_entry(reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
    let elapsed = reading.elapsed_millis()?;
    (elapsed.abs() < thresholds.entry_window_millis()).then(|| {
        Finding::new(
            FindingKind::SimultaneousKmEntry,
            format!(
                "Opening and closing KM entered within {} of each other",
                describe_window(thresholds.entry_window_secs)
            ),
        )
    })
}

// Only the most recent completed check-in is consulted.
fn km_inconsistency(reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
    let previous_closing = reading.prior_readings.first()?.closing_distance?;
    let opening = reading.opening_distance?;
    (opening < previous_closing - thresholds.history_tolerance_km).then(|| {
        Finding::new(
            FindingKind::KmInconsistency,
            format!(
                "Opening KM ({opening}) is inconsistent with previous closing KM ({previous_closing})"
            ),
        )
    })
}

fn round_number_pattern(reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
    let (opening, closing) = reading.distances()?;
    let step = thresholds.round_step_km;
    (opening % step == 0.0 && closing % step == 0.0).then(|| {
        Finding::new(
            FindingKind::RoundNumberPattern,
            format!("Both opening and closing KM are round numbers ({opening}, {closing})"),
        )
    })
}

fn unrealistic_speed(reading: &Reading, thresholds: &DetectionThresholds) -> Option<Finding> {
    let (opening, closing) = reading.distances()?;
    let elapsed = reading.elapsed_millis()?;
    if elapsed <= 0 || closing <= opening {
        return None;
    }

    let hours = elapsed as f64 / MILLIS_PER_HOUR;
    let speed = (closing - opening) / hours;
    (speed > thresholds.max_average_speed_kmh).then(|| {
        Finding::new(
            FindingKind::UnrealisticSpeed,
            format!("Average speed ({speed:.1} km/h) seems unrealistic for delivery vehicle"),
        )
    })
}

fn describe_window(secs: u32) -> String {
    match secs {
        60 => "1 minute".to_string(),
        secs if secs % 60 == 0 => format!("{} minutes", secs / 60),
        secs => format!("{secs} seconds"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::checkins::fraud::{PriorReading, Severity};
    use chrono::{Duration, TimeZone, Utc};

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds::default()
    }

    fn distances(opening: f64, closing: f64) -> Reading {
        Reading::new("KA-01-AB-1234").with_distances(Some(opening), Some(closing))
    }

    fn timed(opening: f64, closing: f64, elapsed: Duration) -> Reading {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 14, 8, 0, 0)
            .single()
            .expect("valid timestamp");
        distances(opening, closing).with_timestamps(Some(start), Some(start + elapsed))
    }

    #[test]
    fn same_km_reading_renders_both_values() {
        let finding = same_km_reading(&distances(500.0, 500.0), &thresholds()).expect("fires");
        assert_eq!(finding.kind, FindingKind::SameKmReading);
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(
            finding.message,
            "Opening KM (500) and Closing KM (500) are identical"
        );
    }

    #[test]
    fn reverse_km_reading_ignores_equal_values() {
        assert!(reverse_km_reading(&distances(500.0, 500.0), &thresholds()).is_none());
        let finding = reverse_km_reading(&distances(500.0, 200.0), &thresholds()).expect("fires");
        assert_eq!(
            finding.message,
            "Closing KM (200) is less than Opening KM (500)"
        );
    }

    #[test]
    fn unrealistic_distance_is_strictly_above_limit() {
        assert!(unrealistic_distance(&distances(100.0, 600.0), &thresholds()).is_none());
        let finding = unrealistic_distance(&distances(100.0, 601.0), &thresholds()).expect("fires");
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(
            finding.message,
            "KM difference (501km) seems unrealistic for a single trip"
        );
    }

    #[test]
    fn simultaneous_entry_uses_absolute_difference() {
        let backwards = timed(200.0, 400.0, Duration::seconds(-30));
        assert!(simultaneous_km_entry(&backwards, &thresholds()).is_some());

        let at_limit = timed(200.0, 400.0, Duration::seconds(60));
        assert!(simultaneous_km_entry(&at_limit, &thresholds()).is_none());

        let just_under = timed(200.0, 400.0, Duration::milliseconds(59_999));
        let finding = simultaneous_km_entry(&just_under, &thresholds()).expect("fires");
        assert_eq!(
            finding.message,
            "Opening and closing KM entered within 1 minute of each other"
        );
    }

    #[test]
    fn simultaneous_entry_needs_both_timestamps() {
        let reading = distances(200.0, 400.0).with_timestamps(Some(Utc::now()), None);
        assert!(simultaneous_km_entry(&reading, &thresholds()).is_none());
    }

    #[test]
    fn km_inconsistency_only_reads_latest_history() {
        let reading = Reading::new("KA-01-AB-1234")
            .with_distances(Some(989.0), None)
            .with_prior_readings(vec![
                PriorReading::closed_at(1000.0, None),
                PriorReading::closed_at(5000.0, None),
            ]);
        let finding = km_inconsistency(&reading, &thresholds()).expect("fires");
        assert_eq!(
            finding.message,
            "Opening KM (989) is inconsistent with previous closing KM (1000)"
        );

        let older_only = Reading::new("KA-01-AB-1234")
            .with_distances(Some(991.0), None)
            .with_prior_readings(vec![
                PriorReading::closed_at(1000.0, None),
                PriorReading::closed_at(5000.0, None),
            ]);
        assert!(km_inconsistency(&older_only, &thresholds()).is_none());
    }

    #[test]
    fn km_inconsistency_skips_when_latest_has_no_closing() {
        let reading = Reading::new("KA-01-AB-1234")
            .with_distances(Some(10.0), None)
            .with_prior_readings(vec![
                PriorReading::default(),
                PriorReading::closed_at(1000.0, None),
            ]);
        assert!(km_inconsistency(&reading, &thresholds()).is_none());
    }

    #[test]
    fn round_number_pattern_requires_both_round() {
        assert!(round_number_pattern(&distances(300.0, 450.0), &thresholds()).is_none());
        let finding = round_number_pattern(&distances(300.0, 500.0), &thresholds()).expect("fires");
        assert_eq!(finding.severity, Severity::Low);
        assert_eq!(
            finding.message,
            "Both opening and closing KM are round numbers (300, 500)"
        );
    }

    #[test]
    fn unrealistic_speed_formats_one_decimal() {
        let reading = timed(100.0, 700.0, Duration::hours(2));
        let finding = unrealistic_speed(&reading, &thresholds()).expect("fires");
        assert_eq!(
            finding.message,
            "Average speed (300.0 km/h) seems unrealistic for delivery vehicle"
        );

        let plausible = timed(100.0, 250.0, Duration::hours(2));
        assert!(unrealistic_speed(&plausible, &thresholds()).is_none());
    }

    #[test]
    fn unrealistic_speed_skips_non_positive_elapsed_time() {
        assert!(unrealistic_speed(&timed(100.0, 700.0, Duration::zero()), &thresholds()).is_none());
        assert!(
            unrealistic_speed(&timed(100.0, 700.0, Duration::hours(-1)), &thresholds()).is_none()
        );
    }

    #[test]
    fn default_rules_follow_table_order() {
        let kinds: Vec<FindingKind> = default_rules().iter().map(Rule::kind).collect();
        assert_eq!(
            kinds,
            vec![
                FindingKind::SameKmReading,
                FindingKind::ReverseKmReading,
                FindingKind::UnrealisticDistance,
                FindingKind::SimultaneousKmEntry,
                FindingKind::KmInconsistency,
                FindingKind::RoundNumberPattern,
                FindingKind::UnrealisticSpeed,
            ]
        );
    }

    #[test]
    fn describe_window_handles_custom_thresholds() {
        assert_eq!(describe_window(60), "1 minute");
        assert_eq!(describe_window(120), "2 minutes");
        assert_eq!(describe_window(45), "45 seconds");
    }
}
