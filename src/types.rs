use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Classifiable pollutants. Declaration order is the evaluation order used
/// for primary-pollutant reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
    No2,
    O3,
    So2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 5] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::No2,
        Pollutant::O3,
        Pollutant::So2,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::No2 => "NO2",
            Pollutant::O3 => "O3",
            Pollutant::So2 => "SO2",
        }
    }
}

impl std::fmt::Display for Pollutant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Pollutant::Pm25 => "pm25",
            Pollutant::Pm10 => "pm10",
            Pollutant::No2 => "no2",
            Pollutant::O3 => "o3",
            Pollutant::So2 => "so2",
        };
        write!(f, "{s}")
    }
}

/// One fully-populated sample for a location. Built only by
/// `ingest::UpstreamSample::normalize`; the engine never sees missing values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// μg/m³
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub dust: f64,
    /// Aerosol optical depth (dimensionless)
    pub aod: f64,
    /// °C
    pub temp: f64,
    /// Relative humidity %
    pub hum: f64,
    /// mm
    pub precip: f64,
    /// Wind gust, km/h
    pub gust: f64,
    /// Boundary-layer height, m
    pub blh: f64,
    pub uv: f64,
}

impl Reading {
    pub fn concentration(&self, pollutant: Pollutant) -> f64 {
        match pollutant {
            Pollutant::Pm25 => self.pm25,
            Pollutant::Pm10 => self.pm10,
            Pollutant::No2 => self.no2,
            Pollutant::O3 => self.o3,
            Pollutant::So2 => self.so2,
        }
    }
}

// ---------------------------------------------------------------------------
// AQI
// ---------------------------------------------------------------------------

/// EEA severity band, level 0..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiBand {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Fair")]
    Fair,
    #[serde(rename = "Moderate")]
    Moderate,
    #[serde(rename = "Poor")]
    Poor,
    #[serde(rename = "Very poor")]
    VeryPoor,
    #[serde(rename = "Extremely poor")]
    ExtremelyPoor,
}

impl AqiBand {
    /// Levels above 5 saturate to `ExtremelyPoor`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => AqiBand::Good,
            1 => AqiBand::Fair,
            2 => AqiBand::Moderate,
            3 => AqiBand::Poor,
            4 => AqiBand::VeryPoor,
            _ => AqiBand::ExtremelyPoor,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            AqiBand::Good => "Good",
            AqiBand::Fair => "Fair",
            AqiBand::Moderate => "Moderate",
            AqiBand::Poor => "Poor",
            AqiBand::VeryPoor => "Very poor",
            AqiBand::ExtremelyPoor => "Extremely poor",
        }
    }
}

impl std::fmt::Display for AqiBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AqiAssessment {
    pub overall_level: u8,
    pub overall_status: AqiBand,
    /// Every pollutant at the overall level, in `Pollutant::ALL` order.
    /// Empty when the overall level is 0.
    pub primary_pollutants: Vec<Pollutant>,
    /// Overall level >= Moderate.
    pub sensitive_alert_active: bool,
    pub per_pollutant_levels: BTreeMap<Pollutant, u8>,
}

// ---------------------------------------------------------------------------
// Compliance + physical risks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub limit_exceeded: bool,
    /// Ordered pm25, pm10, no2, so2, o3.
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalRisks {
    pub stagnation: bool,
    pub wet_deposition: bool,
    /// Implies `wet_deposition`.
    pub scavenging_gap: bool,
    pub o3_generation: bool,
    pub sia_conversion: bool,
    pub transboundary_aloft: bool,
}

impl PhysicalRisks {
    /// Names of the active flags, in field order.
    pub fn active(&self) -> Vec<&'static str> {
        [
            (self.stagnation, "stagnation"),
            (self.wet_deposition, "wet_deposition"),
            (self.scavenging_gap, "scavenging_gap"),
            (self.o3_generation, "o3_generation"),
            (self.sia_conversion, "sia_conversion"),
            (self.transboundary_aloft, "transboundary_aloft"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

/// Engine output for one location at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub timestamp: DateTime<FixedOffset>,
    pub location: String,
    pub raw_reading: Reading,
    pub aqi: AqiAssessment,
    pub compliance: ComplianceResult,
    pub physical: PhysicalRisks,
}

impl RiskAssessment {
    /// Narrative generation is warranted for this assessment on its own.
    pub fn is_risk(&self) -> bool {
        self.aqi.sensitive_alert_active || self.compliance.limit_exceeded
    }
}

// ---------------------------------------------------------------------------
// Daily aggregation
// ---------------------------------------------------------------------------

/// One historical row as read back from the store. Values that could not be
/// read as numbers arrive as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSample {
    pub observed_at: DateTime<FixedOffset>,
    pub location: String,
    pub pm25: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyInsights {
    pub accumulation_pattern: bool,
    pub spike_pattern: bool,
    /// Neither of the above.
    pub stable_pattern: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub location: String,
    pub avg_pm25: f64,
    pub max_pm25: f64,
    pub calm_hours: u32,
    /// Matching rows, including rows whose PM2.5 was dropped.
    pub sample_count: usize,
    pub eu_violation: bool,
    pub insights: DailyInsights,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DailyOutcome {
    InsufficientData,
    Stats(DailyStats),
}

// ---------------------------------------------------------------------------
// Legacy signal + daily limit check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Red,
    Yellow,
    Green,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Red => "RED",
            Signal::Yellow => "YELLOW",
            Signal::Green => "GREEN",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySignal {
    pub signal: Signal,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LimitStatus {
    Ok,
    Warning,
}

impl std::fmt::Display for LimitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitStatus::Ok => write!(f, "OK"),
            LimitStatus::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitCheck {
    pub location: String,
    pub status: LimitStatus,
    pub detail: String,
}
