//! Deterministic environmental risk engine.
//!
//! Every function here is pure: identical inputs give identical outputs, no
//! I/O, no shared state. Thresholds are passed in, never read from globals.

pub mod aqi;
pub mod assess;
pub mod classifier;
pub mod compliance;
pub mod daily;
pub mod legacy;
pub mod physical;

use thiserror::Error;

pub use assess::RiskEngine;

/// Report-facing values are compared and printed at two-decimal precision.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssessmentError {
    /// Caller bug: every reading must be attributed to a location.
    #[error("location must be specified")]
    MissingLocation,
}
