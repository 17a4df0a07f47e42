use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Config, Target, AIR_PARAMS, HTTP_TIMEOUT_SECS, METEO_PARAMS};
use crate::error::{AppError, Result};
use crate::ingest::UpstreamSample;

/// Open-Meteo hourly timestamps: local wall time, minute precision.
const API_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    hourly: Option<AirHourly>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AirHourly {
    time: Vec<String>,
    pm2_5: Vec<Option<f64>>,
    pm10: Vec<Option<f64>>,
    dust: Vec<Option<f64>>,
    aerosol_optical_depth: Vec<Option<f64>>,
    ozone: Vec<Option<f64>>,
    nitrogen_dioxide: Vec<Option<f64>>,
    sulphur_dioxide: Vec<Option<f64>>,
    carbon_monoxide: Vec<Option<f64>>,
    ammonia: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrentResponse {
    current: Option<MeteoValues>,
}

#[derive(Debug, Deserialize)]
struct ForecastHourlyResponse {
    hourly: Option<MeteoHourly>,
}

/// Forecast variables the engine or the log uses. Others in the payload are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct MeteoValues {
    precipitation: Option<f64>,
    wind_gusts_10m: Option<f64>,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    boundary_layer_height: Option<f64>,
    uv_index: Option<f64>,
    pressure_msl: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MeteoHourly {
    time: Vec<String>,
    precipitation: Vec<Option<f64>>,
    wind_gusts_10m: Vec<Option<f64>>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    boundary_layer_height: Vec<Option<f64>>,
    uv_index: Vec<Option<f64>>,
    pressure_msl: Vec<Option<f64>>,
}

fn at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

impl AirHourly {
    fn fill(&self, i: usize, s: &mut UpstreamSample) {
        s.pm2_5 = at(&self.pm2_5, i);
        s.pm10 = at(&self.pm10, i);
        s.dust = at(&self.dust, i);
        s.aerosol_optical_depth = at(&self.aerosol_optical_depth, i);
        s.ozone = at(&self.ozone, i);
        s.nitrogen_dioxide = at(&self.nitrogen_dioxide, i);
        s.sulphur_dioxide = at(&self.sulphur_dioxide, i);
        s.carbon_monoxide = at(&self.carbon_monoxide, i);
        s.ammonia = at(&self.ammonia, i);
    }
}

impl MeteoValues {
    fn fill(&self, s: &mut UpstreamSample) {
        s.precipitation = self.precipitation;
        s.wind_gusts_10m = self.wind_gusts_10m;
        s.temperature_2m = self.temperature_2m;
        s.relative_humidity_2m = self.relative_humidity_2m;
        s.boundary_layer_height = self.boundary_layer_height;
        s.uv_index = self.uv_index;
        s.pressure_msl = self.pressure_msl;
    }
}

impl MeteoHourly {
    fn values_at(&self, i: usize) -> MeteoValues {
        MeteoValues {
            precipitation: at(&self.precipitation, i),
            wind_gusts_10m: at(&self.wind_gusts_10m, i),
            temperature_2m: at(&self.temperature_2m, i),
            relative_humidity_2m: at(&self.relative_humidity_2m, i),
            boundary_layer_height: at(&self.boundary_layer_height, i),
            uv_index: at(&self.uv_index, i),
            pressure_msl: at(&self.pressure_msl, i),
        }
    }
}

// ---------------------------------------------------------------------------
// Current hour
// ---------------------------------------------------------------------------

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

/// Index of the entry for the hour containing `now`, or 0 if absent.
fn hour_index(times: &[String], now: DateTime<FixedOffset>) -> usize {
    let key = now.format("%Y-%m-%dT%H:00").to_string();
    times.iter().position(|t| t.starts_with(&key)).unwrap_or(0)
}

fn merge_current(
    air: Option<AirQualityResponse>,
    meteo: Option<ForecastCurrentResponse>,
    now: DateTime<FixedOffset>,
) -> UpstreamSample {
    let mut sample = UpstreamSample::default();
    if let Some(hourly) = air.and_then(|a| a.hourly) {
        let i = hour_index(&hourly.time, now);
        hourly.fill(i, &mut sample);
    }
    if let Some(current) = meteo.and_then(|m| m.current) {
        current.fill(&mut sample);
    }
    sample
}

/// GET and decode. A transport failure or non-success status is logged and
/// yields `None`, leaving that half of the sample empty.
async fn fetch_optional<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Option<T> {
    let resp = match client.get(url).query(query).send().await {
        Ok(r) => r,
        Err(e) => {
            warn!("[FETCH] request to {url} failed: {e}");
            return None;
        }
    };
    let status = resp.status();
    if !status.is_success() {
        warn!("[FETCH] {url} returned {status}");
        return None;
    }
    match resp.json::<T>().await {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("[FETCH] could not decode {url}: {e}");
            None
        }
    }
}

fn base_query(target: &Target, cfg: &Config) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", target.lat.to_string()),
        ("longitude", target.lon.to_string()),
        ("timezone", cfg.api_timezone.clone()),
    ]
}

async fn fetch_target_current(
    client: &reqwest::Client,
    cfg: &Config,
    target: &Target,
    now: DateTime<FixedOffset>,
) -> UpstreamSample {
    let mut air_query = base_query(target, cfg);
    air_query.push(("hourly", AIR_PARAMS.to_string()));
    air_query.push(("forecast_days", "1".to_string()));

    let mut meteo_query = base_query(target, cfg);
    meteo_query.push(("current", METEO_PARAMS.to_string()));

    let (air, meteo) = tokio::join!(
        fetch_optional::<AirQualityResponse>(client, &cfg.air_quality_api_url, &air_query),
        fetch_optional::<ForecastCurrentResponse>(client, &cfg.forecast_api_url, &meteo_query),
    );
    merge_current(air, meteo, now)
}

/// Fetch the current hour for every target concurrently.
/// Errors only when no target produced any value.
pub async fn fetch_current(
    client: &reqwest::Client,
    cfg: &Config,
    now: DateTime<FixedOffset>,
) -> Result<Vec<(Target, UpstreamSample)>> {
    let samples = join_all(
        cfg.targets
            .iter()
            .map(|t| fetch_target_current(client, cfg, t, now)),
    )
    .await;

    let results = require_any_data(cfg.targets.iter().cloned().zip(samples).collect())?;
    debug!("[FETCH] current hour fetched for {} targets", results.len());
    Ok(results)
}

/// A cycle with no value for any target is an upstream outage, not a skip.
fn require_any_data(results: Vec<(Target, UpstreamSample)>) -> Result<Vec<(Target, UpstreamSample)>> {
    if results.iter().all(|(_, s)| s.is_empty()) {
        return Err(AppError::Upstream("no upstream data for any target".to_string()));
    }
    Ok(results)
}

// ---------------------------------------------------------------------------
// Range backfill
// ---------------------------------------------------------------------------

async fn fetch_required<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    target: &Target,
) -> Result<T> {
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!(
            "API error for {}: {url} returned {status}",
            target.name
        )));
    }
    Ok(resp.json::<T>().await?)
}

fn merge_range(air: AirHourly, meteo: MeteoHourly) -> Vec<(NaiveDateTime, UpstreamSample)> {
    let meteo_index: HashMap<&str, usize> = meteo
        .time
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut rows = Vec::with_capacity(air.time.len());
    for (i, t) in air.time.iter().enumerate() {
        let Ok(hour) = NaiveDateTime::parse_from_str(t, API_TIME_FORMAT) else {
            warn!("[RANGE] skipping unparseable time '{t}'");
            continue;
        };
        let mut sample = UpstreamSample::default();
        air.fill(i, &mut sample);
        if let Some(&j) = meteo_index.get(t.as_str()) {
            meteo.values_at(j).fill(&mut sample);
        }
        rows.push((hour, sample));
    }
    rows
}

/// Hourly history for one target between two dates (inclusive).
/// Any non-success response aborts with an error naming the target.
pub async fn fetch_range(
    client: &reqwest::Client,
    cfg: &Config,
    target: &Target,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDateTime, UpstreamSample)>> {
    let range = [
        ("start_date", start.format("%Y-%m-%d").to_string()),
        ("end_date", end.format("%Y-%m-%d").to_string()),
    ];

    let mut air_query = base_query(target, cfg);
    air_query.push(("hourly", AIR_PARAMS.to_string()));
    air_query.extend(range.iter().cloned());

    let mut meteo_query = base_query(target, cfg);
    meteo_query.push(("hourly", METEO_PARAMS.to_string()));
    meteo_query.extend(range.iter().cloned());

    let (air, meteo) = tokio::try_join!(
        fetch_required::<AirQualityResponse>(client, &cfg.air_quality_api_url, &air_query, target),
        fetch_required::<ForecastHourlyResponse>(client, &cfg.forecast_api_url, &meteo_query, target),
    )?;

    Ok(merge_range(
        air.hourly.unwrap_or_default(),
        meteo.hourly.unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 12, 1, 2, 41, 0)
            .unwrap()
    }

    const AIR_JSON: &str = r#"{
        "latitude": 35.2, "longitude": 136.7,
        "hourly_units": {"time": "iso8601", "pm2_5": "μg/m³"},
        "hourly": {
            "time": ["2025-12-01T00:00", "2025-12-01T01:00", "2025-12-01T02:00"],
            "pm2_5": [4.1, 5.2, 18.3],
            "pm10": [8.0, 9.0, 21.0],
            "dust": [0.0, 0.0, 1.0],
            "aerosol_optical_depth": [0.2, 0.3, 0.55],
            "ozone": [50.0, 52.0, null],
            "nitrogen_dioxide": [12.0, 13.0, 14.0],
            "sulphur_dioxide": [1.0, 1.0, 2.0],
            "carbon_monoxide": [200.0, 210.0, 220.0],
            "ammonia": [null, null, null]
        }
    }"#;

    const CURRENT_JSON: &str = r#"{
        "current_units": {"time": "iso8601"},
        "current": {
            "time": "2025-12-01T02:30", "interval": 900,
            "precipitation": 0.8, "weather_code": 61, "wind_gusts_10m": 6.5,
            "cloud_cover": 100, "surface_pressure": 1009.1, "pressure_msl": 1013.2,
            "temperature_2m": 7.4, "relative_humidity_2m": 88,
            "freezing_level_height": 1800, "boundary_layer_height": 240, "uv_index": 0.0
        }
    }"#;

    #[test]
    fn hour_index_matches_current_hour() {
        let times = vec!["2025-12-01T00:00".to_string(), "2025-12-01T02:00".to_string()];
        assert_eq!(hour_index(&times, now()), 1);
        assert_eq!(hour_index(&["2025-11-30T23:00".to_string()], now()), 0);
        assert_eq!(hour_index(&[], now()), 0);
    }

    #[test]
    fn merges_air_hour_with_current_meteo() {
        let air: AirQualityResponse = serde_json::from_str(AIR_JSON).unwrap();
        let meteo: ForecastCurrentResponse = serde_json::from_str(CURRENT_JSON).unwrap();
        let s = merge_current(Some(air), Some(meteo), now());

        assert_eq!(s.pm2_5, Some(18.3));
        assert_eq!(s.aerosol_optical_depth, Some(0.55));
        assert_eq!(s.ozone, None);
        assert_eq!(s.ammonia, None);
        assert_eq!(s.precipitation, Some(0.8));
        assert_eq!(s.relative_humidity_2m, Some(88.0));
        assert_eq!(s.boundary_layer_height, Some(240.0));
    }

    #[test]
    fn missing_halves_leave_fields_empty() {
        let meteo: ForecastCurrentResponse = serde_json::from_str(CURRENT_JSON).unwrap();
        let s = merge_current(None, Some(meteo), now());
        assert_eq!(s.pm2_5, None);
        assert_eq!(s.wind_gusts_10m, Some(6.5));

        assert!(merge_current(None, None, now()).is_empty());
    }

    #[test]
    fn range_joins_meteo_by_timestamp() {
        let air: AirQualityResponse = serde_json::from_str(AIR_JSON).unwrap();
        let meteo: ForecastHourlyResponse = serde_json::from_str(
            r#"{"hourly": {
                "time": ["2025-12-01T01:00", "2025-12-01T02:00"],
                "precipitation": [0.0, 1.2],
                "wind_gusts_10m": [4.0, 5.0],
                "boundary_layer_height": [300, null]
            }}"#,
        )
        .unwrap();

        let rows = merge_range(air.hourly.unwrap(), meteo.hourly.unwrap());
        assert_eq!(rows.len(), 3);

        let (first_hour, first) = &rows[0];
        assert_eq!(first_hour.format(API_TIME_FORMAT).to_string(), "2025-12-01T00:00");
        assert_eq!(first.pm2_5, Some(4.1));
        assert_eq!(first.precipitation, None);

        let (_, last) = &rows[2];
        assert_eq!(last.precipitation, Some(1.2));
        assert_eq!(last.boundary_layer_height, None);
        assert_eq!(last.temperature_2m, None);
    }

    #[test]
    fn range_skips_bad_timestamps() {
        let air = AirHourly {
            time: vec!["not-a-time".to_string(), "2025-12-01T05:00".to_string()],
            pm2_5: vec![Some(1.0), Some(2.0)],
            ..AirHourly::default()
        };
        let rows = merge_range(air, MeteoHourly::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1.pm2_5, Some(2.0));
    }

    #[test]
    fn all_empty_targets_is_an_upstream_error() {
        let targets = crate::config::default_targets();
        let empty: Vec<_> = targets.iter().cloned().map(|t| (t, UpstreamSample::default())).collect();
        let err = require_any_data(empty).unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let mut partial: Vec<_> = targets.into_iter().map(|t| (t, UpstreamSample::default())).collect();
        partial[0].1.pm2_5 = Some(4.0);
        let kept = require_any_data(partial).unwrap();
        assert_eq!(kept.len(), crate::config::default_targets().len());
        assert!(kept[1..].iter().all(|(_, s)| s.is_empty()));
    }

    #[tokio::test]
    async fn unreachable_upstream_fails_the_cycle() {
        let mut cfg = Config::for_tests();
        cfg.air_quality_api_url = "http://127.0.0.1:9/v1/air-quality".into();
        cfg.forecast_api_url = "http://127.0.0.1:9/v1/forecast".into();
        let err = fetch_current(&reqwest::Client::new(), &cfg, now()).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)), "{err}");
    }
}
