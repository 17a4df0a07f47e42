use std::path::PathBuf;
use std::str::FromStr;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::types::Pollutant;

pub const AIR_QUALITY_API_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
pub const FORECAST_API_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Hourly air-quality variables requested from the CAMS endpoint.
pub const AIR_PARAMS: &str = "pm2_5,pm10,dust,aerosol_optical_depth,ozone,nitrogen_dioxide,sulphur_dioxide,carbon_monoxide,ammonia";

/// Meteorological variables requested from the forecast endpoint.
pub const METEO_PARAMS: &str = "precipitation,weather_code,wind_gusts_10m,cloud_cover,surface_pressure,pressure_msl,temperature_2m,relative_humidity_2m,freezing_level_height,boundary_layer_height,uv_index";

/// Upstream request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Channel capacity for the DB writer.
pub const CHANNEL_CAPACITY: usize = 256;

/// Boundary-layer height substituted when the forecast omits it (metres).
pub const DEFAULT_BLH_M: f64 = 1000.0;

/// km/h → m/s for gust-derived wind speed.
pub const KMH_PER_MS: f64 = 3.6;

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Target {
    fn new(id: &str, name: &str, lat: f64, lon: f64) -> Self {
        Self { id: id.to_string(), name: name.to_string(), lat, lon }
    }
}

pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new("HOME", "Home", 35.1946209, 136.7286856),
        Target::new("UNIV", "Univ", 35.0793000, 136.9057000),
        Target::new("COMMUTE", "Commute", 35.1697000, 136.8631000),
    ]
}

/// Parse `ID:Name:lat:lon;ID:Name:lat:lon`.
/// Parse a strictly positive integer setting; zero or garbage is a config error.
pub fn parse_positive<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr + Default + PartialOrd,
{
    raw.trim()
        .parse::<T>()
        .ok()
        .filter(|v| *v > T::default())
        .ok_or_else(|| AppError::Config(format!("{name} must be a positive integer, got {raw:?}")))
}

fn positive_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + Default + PartialOrd,
{
    match std::env::var(name) {
        Ok(raw) => parse_positive(name, &raw),
        Err(_) => Ok(default),
    }
}

pub fn parse_targets(s: &str) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let [id, name, lat, lon] = parts[..] else {
            return Err(AppError::Config(format!(
                "TARGETS entry '{entry}' must be ID:Name:lat:lon"
            )));
        };
        if id.is_empty() || name.is_empty() {
            return Err(AppError::Config(format!("TARGETS entry '{entry}' has an empty id or name")));
        }
        let lat = lat
            .parse::<f64>()
            .map_err(|_| AppError::Config(format!("TARGETS latitude '{lat}' is not a number")))?;
        let lon = lon
            .parse::<f64>()
            .map_err(|_| AppError::Config(format!("TARGETS longitude '{lon}' is not a number")))?;
        targets.push(Target::new(id, name, lat, lon));
    }
    if targets.is_empty() {
        return Err(AppError::Config("TARGETS is set but lists no targets".to_string()));
    }
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Threshold tables
// ---------------------------------------------------------------------------

/// EEA AQI inclusive upper bounds per pollutant (μg/m³), index = level.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BandTable {
    pub pm25: [f64; 6],
    pub pm10: [f64; 6],
    pub no2: [f64; 6],
    pub o3: [f64; 6],
    pub so2: [f64; 6],
}

impl BandTable {
    pub fn bands(&self, pollutant: Pollutant) -> &[f64; 6] {
        match pollutant {
            Pollutant::Pm25 => &self.pm25,
            Pollutant::Pm10 => &self.pm10,
            Pollutant::No2 => &self.no2,
            Pollutant::O3 => &self.o3,
            Pollutant::So2 => &self.so2,
        }
    }
}

impl Default for BandTable {
    fn default() -> Self {
        Self {
            pm25: [5.0, 15.0, 50.0, 90.0, 140.0, f64::INFINITY],
            pm10: [15.0, 45.0, 120.0, 195.0, 270.0, f64::INFINITY],
            no2: [10.0, 25.0, 60.0, 100.0, 150.0, f64::INFINITY],
            o3: [60.0, 100.0, 120.0, 160.0, 180.0, f64::INFINITY],
            so2: [20.0, 40.0, 125.0, 190.0, 275.0, f64::INFINITY],
        }
    }
}

/// Directive (EU) 2024/2881 absolute limits. Breach is strict `>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EuLimits {
    /// PM2.5 24h
    pub pm25: f64,
    /// PM10 24h
    pub pm10: f64,
    /// NO2 1h
    pub no2: f64,
    /// SO2 1h
    pub so2: f64,
    /// O3 8h
    pub o3: f64,
}

impl Default for EuLimits {
    fn default() -> Self {
        Self { pm25: 25.0, pm10: 45.0, no2: 200.0, so2: 350.0, o3: 120.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhysicalThresholds {
    /// Stagnation: BLH strictly below (m)
    pub stagnation_blh_m: f64,
    /// Stagnation: gust strictly below (km/h)
    pub stagnation_gust_kmh: f64,
    /// Wet deposition: precipitation strictly above (mm)
    pub wet_precip_mm: f64,
    /// Scavenging gap: PM2.5 at or above, only under wet deposition
    pub scavenging_pm25: f64,
    pub o3_uv_index: f64,
    pub o3_temp_c: f64,
    pub o3_no2: f64,
    pub sia_humidity_pct: f64,
    pub sia_dust: f64,
    /// Transboundary: surface PM2.5 at or below
    pub transboundary_pm25: f64,
    /// Transboundary: AOD at or above
    pub transboundary_aod: f64,
}

impl Default for PhysicalThresholds {
    fn default() -> Self {
        Self {
            stagnation_blh_m: 500.0,
            stagnation_gust_kmh: 10.0,
            wet_precip_mm: 0.5,
            scavenging_pm25: 16.0,
            o3_uv_index: 5.0,
            o3_temp_c: 25.0,
            o3_no2: 20.0,
            sia_humidity_pct: 75.0,
            sia_dust: 20.0,
            transboundary_pm25: 15.0,
            transboundary_aod: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DailyThresholds {
    /// Wind speed strictly below this counts as a calm hour (m/s).
    pub calm_wind_ms: f64,
    pub accumulation_calm_hours: u32,
    /// `max > avg * spike_ratio` marks a spike day.
    pub spike_ratio: f64,
    /// EU 24h PM2.5 limit applied to the daily mean (strict `>`).
    pub eu_daily_pm25: f64,
}

impl Default for DailyThresholds {
    fn default() -> Self {
        Self { calm_wind_ms: 2.0, accumulation_calm_hours: 8, spike_ratio: 2.5, eu_daily_pm25: 25.0 }
    }
}

/// Three-tier dashboard signal. RED tiers are `>=`; SO2 has no YELLOW tier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LegacyThresholds {
    pub red_pm25: f64,
    pub red_no2: f64,
    pub red_so2: f64,
    pub yellow_pm25: f64,
    pub yellow_no2: f64,
}

impl Default for LegacyThresholds {
    fn default() -> Self {
        Self { red_pm25: 25.0, red_no2: 50.0, red_so2: 50.0, yellow_pm25: 10.0, yellow_no2: 20.0 }
    }
}

/// Per-location daily limit check (strict `>`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DailyLimits {
    pub pm25: f64,
    pub no2: f64,
    pub so2: f64,
}

impl Default for DailyLimits {
    fn default() -> Self {
        Self { pm25: 25.0, no2: 50.0, so2: 50.0 }
    }
}

/// Every constant the engine consults. Passed by value into the engine;
/// overridable from a TOML file (`THRESHOLDS_PATH`), missing keys keep defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub bands: BandTable,
    pub eu_limits: EuLimits,
    pub physical: PhysicalThresholds,
    pub daily: DailyThresholds,
    pub legacy: LegacyThresholds,
    pub daily_limits: DailyLimits,
}

impl Thresholds {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

// ---------------------------------------------------------------------------
// Runtime config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub archive_dir: PathBuf,
    pub air_quality_api_url: String,
    pub forecast_api_url: String,
    /// IANA zone name passed to Open-Meteo (API_TIMEZONE)
    pub api_timezone: String,
    /// Offset defining the local calendar day (UTC_OFFSET_HOURS)
    pub local_offset: FixedOffset,
    pub poll_interval_secs: u64,
    pub daily_report_interval_secs: u64,
    /// Rows older than this are exported and purged (RETENTION_DAYS)
    pub retention_days: u32,
    /// Newest AI summaries kept (AI_LOG_MAX)
    pub ai_log_max: u32,
    pub ai_model: String,
    pub gemini_api_key: Option<String>,
    pub targets: Vec<Target>,
    /// Target id that drives narrative generation and the daily report (PRIMARY_TARGET)
    pub primary_target: String,
    pub thresholds: Thresholds,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let targets = match std::env::var("TARGETS") {
            Ok(s) => parse_targets(&s)?,
            Err(_) => default_targets(),
        };
        let primary_target = std::env::var("PRIMARY_TARGET").unwrap_or_else(|_| "HOME".to_string());
        if !targets.iter().any(|t| t.id == primary_target) {
            return Err(AppError::Config(format!(
                "PRIMARY_TARGET '{primary_target}' is not one of the configured targets"
            )));
        }

        let thresholds = match std::env::var("THRESHOLDS_PATH") {
            Ok(p) => Thresholds::load(std::path::Path::new(&p))?,
            Err(_) => Thresholds::default(),
        };

        let local_offset = std::env::var("UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "9".to_string())
            .parse::<i32>()
            .ok()
            .and_then(|h| FixedOffset::east_opt(h * 3600))
            .ok_or_else(|| AppError::Config("UTC_OFFSET_HOURS must be an integer within ±23".to_string()))?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "aero.db".to_string()),
            archive_dir: PathBuf::from(
                std::env::var("ARCHIVE_DIR").unwrap_or_else(|_| "archive".to_string()),
            ),
            air_quality_api_url: std::env::var("AIR_QUALITY_API_URL")
                .unwrap_or_else(|_| AIR_QUALITY_API_URL.to_string()),
            forecast_api_url: std::env::var("FORECAST_API_URL")
                .unwrap_or_else(|_| FORECAST_API_URL.to_string()),
            api_timezone: std::env::var("API_TIMEZONE").unwrap_or_else(|_| "Asia/Tokyo".to_string()),
            local_offset,
            poll_interval_secs: positive_env("POLL_INTERVAL_SECS", 3600)?,
            daily_report_interval_secs: positive_env("DAILY_REPORT_INTERVAL_SECS", 3600)?,
            retention_days: positive_env("RETENTION_DAYS", 32)?,
            ai_log_max: positive_env("AI_LOG_MAX", 40)?,
            ai_model: std::env::var("AI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            targets,
            primary_target,
            thresholds,
        })
    }

    pub fn primary(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == self.primary_target)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without reading the environment.
    pub(crate) fn for_tests() -> Self {
        Self {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            archive_dir: std::env::temp_dir().join("aero-test-archive"),
            air_quality_api_url: AIR_QUALITY_API_URL.to_string(),
            forecast_api_url: FORECAST_API_URL.to_string(),
            api_timezone: "Asia/Tokyo".to_string(),
            local_offset: FixedOffset::east_opt(9 * 3600).unwrap(),
            poll_interval_secs: 3600,
            daily_report_interval_secs: 3600,
            retention_days: 32,
            ai_log_max: 40,
            ai_model: "test-model".to_string(),
            gemini_api_key: None,
            targets: default_targets(),
            primary_target: "HOME".to_string(),
            thresholds: Thresholds::default(),
        }
    }
}
