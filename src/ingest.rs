//! Boundary between upstream payloads and the engine.
//!
//! Upstream values arrive as `Option<f64>`. `UpstreamSample::normalize` is
//! the only place a missing value becomes a number:
//!
//! | field | default |
//! |---|---|
//! | boundary-layer height | `DEFAULT_BLH_M` (1000 m) |
//! | everything else | `0.0` |
//!
//! A zero default reads as "Good" downstream, so `normalize` also reports
//! which fields it filled. The daily aggregator uses a different policy
//! (drop unreadable values) and never goes through here.

use serde::Serialize;

use crate::config::{DEFAULT_BLH_M, KMH_PER_MS};
use crate::types::Reading;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamSample {
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
    pub nitrogen_dioxide: Option<f64>,
    pub sulphur_dioxide: Option<f64>,
    pub ozone: Option<f64>,
    pub carbon_monoxide: Option<f64>,
    pub ammonia: Option<f64>,
    pub dust: Option<f64>,
    pub aerosol_optical_depth: Option<f64>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
    pub boundary_layer_height: Option<f64>,
    pub uv_index: Option<f64>,
    pub pressure_msl: Option<f64>,
}

/// Values logged alongside a reading that the engine does not consume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Supplementary {
    pub co: Option<f64>,
    pub nh3: Option<f64>,
    pub pressure_msl: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    pub reading: Reading,
    pub supplementary: Supplementary,
    /// Reading fields that were absent upstream and got the default.
    pub defaulted: Vec<&'static str>,
}

impl UpstreamSample {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn normalize(&self) -> NormalizedReading {
        let mut defaulted = Vec::new();
        let mut take = |name: &'static str, v: Option<f64>, default: f64| match v {
            Some(x) if x.is_finite() => x,
            _ => {
                defaulted.push(name);
                default
            }
        };

        let reading = Reading {
            pm25: take("pm25", self.pm2_5, 0.0),
            pm10: take("pm10", self.pm10, 0.0),
            no2: take("no2", self.nitrogen_dioxide, 0.0),
            so2: take("so2", self.sulphur_dioxide, 0.0),
            o3: take("o3", self.ozone, 0.0),
            dust: take("dust", self.dust, 0.0),
            aod: take("aod", self.aerosol_optical_depth, 0.0),
            temp: take("temp", self.temperature_2m, 0.0),
            hum: take("hum", self.relative_humidity_2m, 0.0),
            precip: take("precip", self.precipitation, 0.0),
            gust: take("gust", self.wind_gusts_10m, 0.0),
            blh: take("blh", self.boundary_layer_height, DEFAULT_BLH_M),
            uv: take("uv", self.uv_index, 0.0),
        };

        NormalizedReading {
            reading,
            supplementary: Supplementary {
                co: self.carbon_monoxide,
                nh3: self.ammonia,
                pressure_msl: self.pressure_msl,
            },
            defaulted,
        }
    }
}

/// Wind speed in m/s derived from the 10 m gust (km/h).
pub fn wind_speed_ms(reading: &Reading) -> f64 {
    reading.gust / KMH_PER_MS
}
