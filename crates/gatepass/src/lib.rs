//! Gate-pass check-in tracking for retail store fleets.
//!
//! The odometer fraud detector lives in [`workflows::checkins::fraud`]; the surrounding
//! check-in workflow persists verdicts, raises alerts and notifies live subscribers.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
