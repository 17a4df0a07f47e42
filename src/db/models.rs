//! Row types for the SQLite schema in `migrations/0001_init.sql`.
//! Archived tables also derive `Serialize` so rows export straight to CSV.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::ingest::UpstreamSample;
use crate::types::LegacySignal;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ObservationRow {
    pub id: i64,
    pub observed_at: i64,
    pub observed_local: String,
    pub location: String,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub o3: Option<f64>,
    pub co: Option<f64>,
    pub nh3: Option<f64>,
    pub dust: Option<f64>,
    pub aod: Option<f64>,
    pub temp: Option<f64>,
    pub hum: Option<f64>,
    pub precip: Option<f64>,
    pub gust: Option<f64>,
    pub wind_speed: Option<f64>,
    pub blh: Option<f64>,
    pub uv: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub signal: String,
    pub reason: String,
    pub defaulted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct AssessmentRow {
    pub id: i64,
    pub observed_at: i64,
    pub observed_local: String,
    pub location: String,
    pub overall_level: i64,
    pub overall_status: String,
    pub primary_pollutants: String,
    pub sensitive_alert: i64,
    pub limit_exceeded: i64,
    pub violations: String,
    pub physical_flags: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct LimitCheckRow {
    pub id: i64,
    pub checked_at: i64,
    pub checked_local: String,
    pub location: String,
    pub status: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DailyStatsRow {
    pub date: String,
    pub location: String,
    pub avg_pm25: f64,
    pub max_pm25: f64,
    pub calm_hours: i64,
    pub sample_count: i64,
    pub eu_violation: i64,
    pub accumulation: i64,
    pub spike: i64,
    pub stable: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SummaryRow {
    pub id: i64,
    pub created_at: i64,
    pub kind: String,
    pub location: String,
    pub model: String,
    pub content: String,
}

/// Raw reading for one location/hour as it goes into `observations`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub observed_at: DateTime<FixedOffset>,
    pub location: String,
    pub sample: UpstreamSample,
    pub signal: LegacySignal,
    pub defaulted: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryKind {
    Hourly,
    Daily,
}

impl std::fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryKind::Hourly => write!(f, "hourly"),
            SummaryKind::Daily => write!(f, "daily"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSummary {
    pub created_at: DateTime<FixedOffset>,
    pub kind: SummaryKind,
    pub location: String,
    pub model: String,
    pub content: String,
}
