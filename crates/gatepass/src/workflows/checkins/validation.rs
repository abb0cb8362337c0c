use chrono::{DateTime, Duration, Utc};

use super::domain::{CheckinSubmission, CheckoutReading};
use super::fraud::Reading;

const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Shape errors rejected before a reading ever reaches the fraud detector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckinValidationError {
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },
    #[error("{field} must be a finite, non-negative distance (found {value})")]
    InvalidDistance { field: &'static str, value: f64 },
    #[error("{field} is in the future ({at}, allowed skew {skew_secs}s)")]
    FutureTimestamp {
        field: &'static str,
        at: DateTime<Utc>,
        skew_secs: i64,
    },
}

/// Guard applied to submissions and check-outs on the way into the workflow.
#[derive(Debug, Clone)]
pub struct CheckinGuard {
    max_clock_skew: Duration,
}

impl CheckinGuard {
    pub fn new(max_clock_skew_secs: i64) -> Self {
        let sanitized = if max_clock_skew_secs >= 0 {
            max_clock_skew_secs
        } else {
            DEFAULT_MAX_CLOCK_SKEW_SECS
        };

        Self {
            max_clock_skew: Duration::seconds(sanitized),
        }
    }

    pub fn max_clock_skew_secs(&self) -> i64 {
        self.max_clock_skew.num_seconds()
    }

    pub fn validate_submission(
        &self,
        submission: &CheckinSubmission,
        now: DateTime<Utc>,
    ) -> Result<(), CheckinValidationError> {
        require_text("store_code", &submission.store_code)?;
        require_text("vehicle_number", &submission.vehicle_number)?;

        if let Some(km) = submission.opening_km {
            require_distance("opening_km", km)?;
        }
        if let Some(km) = submission.closing_km {
            require_distance("closing_km", km)?;
        }
        if let Some(at) = submission.opening_at {
            self.require_not_future("opening_at", at, now)?;
        }
        if let Some(at) = submission.closing_at {
            self.require_not_future("closing_at", at, now)?;
        }

        Ok(())
    }

    pub fn validate_checkout(
        &self,
        checkout: &CheckoutReading,
        now: DateTime<Utc>,
    ) -> Result<(), CheckinValidationError> {
        require_distance("closing_km", checkout.closing_km)?;
        self.require_not_future("closing_at", checkout.closing_at, now)
    }

    /// Distance checks for readings handed straight to the detector.
    pub fn validate_reading(&self, reading: &Reading) -> Result<(), CheckinValidationError> {
        if let Some(km) = reading.opening_distance {
            require_distance("opening_distance", km)?;
        }
        if let Some(km) = reading.closing_distance {
            require_distance("closing_distance", km)?;
        }
        for prior in &reading.prior_readings {
            if let Some(km) = prior.closing_distance {
                require_distance("prior_readings.closing_distance", km)?;
            }
        }
        Ok(())
    }

    fn require_not_future(
        &self,
        field: &'static str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), CheckinValidationError> {
        if at > now + self.max_clock_skew {
            return Err(CheckinValidationError::FutureTimestamp {
                field,
                at,
                skew_secs: self.max_clock_skew_secs(),
            });
        }
        Ok(())
    }
}

impl Default for CheckinGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CLOCK_SKEW_SECS)
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), CheckinValidationError> {
    if value.trim().is_empty() {
        return Err(CheckinValidationError::BlankField { field });
    }
    Ok(())
}

fn require_distance(field: &'static str, value: f64) -> Result<(), CheckinValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CheckinValidationError::InvalidDistance { field, value });
    }
    Ok(())
}
