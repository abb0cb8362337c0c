use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TRIP_KM: f64 = 500.0;
pub const DEFAULT_ENTRY_WINDOW_SECS: u32 = 60;
pub const DEFAULT_HISTORY_TOLERANCE_KM: f64 = 10.0;
pub const DEFAULT_ROUND_STEP_KM: f64 = 100.0;
pub const DEFAULT_MAX_SPEED_KMH: f64 = 80.0;

/// Tunable limits consulted by the odometer rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionThresholds {
    /// Longest plausible single trip; anything strictly above is flagged.
    pub max_trip_km: f64,
    /// Opening and closing entries closer than this are treated as simultaneous.
    pub entry_window_secs: u32,
    /// Allowed shortfall between the previous closing reading and the new opening reading.
    pub history_tolerance_km: f64,
    pub round_step_km: f64,
    pub max_average_speed_kmh: f64,
}

impl DetectionThresholds {
    pub(crate) fn entry_window_millis(&self) -> i64 {
        i64::from(self.entry_window_secs) * 1_000
    }
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            max_trip_km: DEFAULT_MAX_TRIP_KM,
            entry_window_secs: DEFAULT_ENTRY_WINDOW_SECS,
            history_tolerance_km: DEFAULT_HISTORY_TOLERANCE_KM,
            round_step_km: DEFAULT_ROUND_STEP_KM,
            max_average_speed_kmh: DEFAULT_MAX_SPEED_KMH,
        }
    }
}
