use super::round2;
use crate::config::{DailyLimits, EuLimits};
use crate::types::{ComplianceResult, LimitCheck, LimitStatus, Reading};

/// EU 2030 absolute limits. All five checks always run; violation order is
/// pm25, pm10, no2, so2, o3.
pub fn check_limits(limits: &EuLimits, r: &Reading) -> ComplianceResult {
    let checks = [
        (r.pm25 > limits.pm25, format!("PM2.5 24h limit ({}μg/m3) exceeded", limits.pm25)),
        (r.pm10 > limits.pm10, format!("PM10 24h limit ({}μg/m3) exceeded", limits.pm10)),
        (r.no2 > limits.no2, format!("NO2 1h limit ({}μg/m3) exceeded", limits.no2)),
        (r.so2 > limits.so2, format!("SO2 1h limit ({}μg/m3) exceeded", limits.so2)),
        (r.o3 > limits.o3, format!("O3 8h target ({}μg/m3) exceeded", limits.o3)),
    ];

    let violations: Vec<String> = checks
        .into_iter()
        .filter_map(|(breached, msg)| breached.then_some(msg))
        .collect();

    ComplianceResult { limit_exceeded: !violations.is_empty(), violations }
}

/// Per-location check of the latest hour against the daily limit table.
pub fn check_daily_limits(limits: &DailyLimits, location: &str, r: &Reading) -> LimitCheck {
    let (pm25, no2, so2) = (round2(r.pm25), round2(r.no2), round2(r.so2));
    let mut warnings = Vec::new();
    if pm25 > limits.pm25 {
        warnings.push(format!("PM2.5({pm25})"));
    }
    if no2 > limits.no2 {
        warnings.push(format!("NO2({no2})"));
    }
    if so2 > limits.so2 {
        warnings.push(format!("SO2({so2})"));
    }

    if warnings.is_empty() {
        LimitCheck {
            location: location.to_string(),
            status: LimitStatus::Ok,
            detail: format!("[{location}] All clear. PM2.5:{pm25}"),
        }
    } else {
        LimitCheck {
            location: location.to_string(),
            status: LimitStatus::Warning,
            detail: format!("[{location}] {} > EU Limit", warnings.join(", ")),
        }
    }
}
