use chrono::{DateTime, FixedOffset};

use crate::config::Thresholds;
use crate::engine::{aqi, compliance, daily, legacy, physical, AssessmentError};
use crate::types::{
    DailyOutcome, HistoricalSample, LegacySignal, LimitCheck, Reading, RiskAssessment,
};

/// Facade over the engine components, bound to one threshold set.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    thresholds: Thresholds,
}

impl RiskEngine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Full point-in-time assessment. An empty location is a caller bug and
    /// fails rather than defaulting.
    pub fn assess(
        &self,
        location: &str,
        timestamp: DateTime<FixedOffset>,
        reading: Reading,
    ) -> Result<RiskAssessment, AssessmentError> {
        if location.trim().is_empty() {
            return Err(AssessmentError::MissingLocation);
        }

        Ok(RiskAssessment {
            timestamp,
            location: location.to_string(),
            raw_reading: reading,
            aqi: aqi::assess_aqi(&self.thresholds.bands, &reading),
            compliance: compliance::check_limits(&self.thresholds.eu_limits, &reading),
            physical: physical::evaluate(&self.thresholds.physical, &reading),
        })
    }

    pub fn legacy_signal(&self, reading: &Reading) -> LegacySignal {
        legacy::strict_signal(&self.thresholds.legacy, reading.pm25, reading.no2, reading.so2)
    }

    pub fn daily_limit_check(&self, location: &str, reading: &Reading) -> LimitCheck {
        compliance::check_daily_limits(&self.thresholds.daily_limits, location, reading)
    }

    pub fn daily(
        &self,
        samples: &[HistoricalSample],
        location: &str,
        now: DateTime<FixedOffset>,
    ) -> DailyOutcome {
        daily::aggregate(&self.thresholds.daily, samples, location, now)
    }
}
