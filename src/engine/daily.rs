use chrono::{DateTime, FixedOffset, TimeZone};

use crate::config::DailyThresholds;
use crate::types::{DailyInsights, DailyOutcome, DailyStats, HistoricalSample};

/// Start of the calendar day containing `now`, in `now`'s own offset.
pub fn local_midnight(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .unwrap_or(now)
}

/// Full scan of today's rows for one location.
///
/// Rows are kept when `observed_at >= local midnight` and the location
/// matches exactly. Unreadable PM2.5/wind values are dropped from the
/// statistics (never zero-filled) but the row still counts toward
/// `sample_count`. No matching rows, or no readable PM2.5 at all, yields
/// `InsufficientData`.
pub fn aggregate(
    t: &DailyThresholds,
    samples: &[HistoricalSample],
    location: &str,
    now: DateTime<FixedOffset>,
) -> DailyOutcome {
    let day_start = local_midnight(now);

    let today: Vec<&HistoricalSample> = samples
        .iter()
        .filter(|s| s.observed_at >= day_start && s.location == location)
        .collect();
    if today.is_empty() {
        return DailyOutcome::InsufficientData;
    }

    let pm25: Vec<f64> = today
        .iter()
        .filter_map(|s| s.pm25)
        .filter(|v| v.is_finite())
        .collect();
    if pm25.is_empty() {
        return DailyOutcome::InsufficientData;
    }

    let avg_pm25 = pm25.iter().sum::<f64>() / pm25.len() as f64;
    let max_pm25 = pm25.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let calm_hours = today
        .iter()
        .filter_map(|s| s.wind_speed)
        .filter(|v| v.is_finite() && *v < t.calm_wind_ms)
        .count() as u32;

    DailyOutcome::Stats(DailyStats {
        date: day_start.date_naive(),
        location: location.to_string(),
        avg_pm25,
        max_pm25,
        calm_hours,
        sample_count: today.len(),
        eu_violation: avg_pm25 > t.eu_daily_pm25,
        insights: derive_insights(t, avg_pm25, max_pm25, calm_hours),
    })
}

/// Accumulation and spike can both hold; stable is the fallback when neither does.
pub fn derive_insights(t: &DailyThresholds, avg: f64, max: f64, calm_hours: u32) -> DailyInsights {
    let accumulation_pattern = calm_hours >= t.accumulation_calm_hours;
    let spike_pattern = max > avg * t.spike_ratio;
    DailyInsights {
        accumulation_pattern,
        spike_pattern,
        stable_pattern: !accumulation_pattern && !spike_pattern,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn now() -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(2025, 12, 1, 23, 30, 0).unwrap()
    }

    fn sample(hour: u32, location: &str, pm25: Option<f64>, wind: Option<f64>) -> HistoricalSample {
        HistoricalSample {
            observed_at: jst().with_ymd_and_hms(2025, 12, 1, hour, 0, 0).unwrap(),
            location: location.to_string(),
            pm25,
            wind_speed: wind,
        }
    }

    fn series(values: &[f64], wind: f64) -> Vec<HistoricalSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| sample(i as u32, "Home", Some(*v), Some(wind)))
            .collect()
    }

    fn stats(outcome: DailyOutcome) -> DailyStats {
        match outcome {
            DailyOutcome::Stats(s) => s,
            DailyOutcome::InsufficientData => panic!("expected stats"),
        }
    }

    #[test]
    fn midnight_is_in_local_offset() {
        let m = local_midnight(now());
        assert_eq!(m, jst().with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn empty_history_is_insufficient() {
        let t = DailyThresholds::default();
        assert_eq!(aggregate(&t, &[], "Home", now()), DailyOutcome::InsufficientData);
    }

    #[test]
    fn other_days_and_locations_are_ignored() {
        let t = DailyThresholds::default();
        let mut rows = vec![sample(3, "Univ", Some(80.0), Some(0.5))];
        rows.push(HistoricalSample {
            observed_at: now() - Duration::days(1),
            ..sample(0, "Home", Some(90.0), Some(0.5))
        });
        assert_eq!(aggregate(&t, &rows, "Home", now()), DailyOutcome::InsufficientData);
    }

    #[test]
    fn spike_day() {
        let s = stats(aggregate(&DailyThresholds::default(), &series(&[10.0, 10.0, 10.0, 60.0], 3.0), "Home", now()));
        assert!((s.avg_pm25 - 22.5).abs() < 1e-9);
        assert_eq!(s.max_pm25, 60.0);
        assert_eq!(s.calm_hours, 0);
        assert_eq!(s.sample_count, 4);
        assert!(!s.eu_violation);
        assert!(s.insights.spike_pattern);
        assert!(!s.insights.accumulation_pattern);
        assert!(!s.insights.stable_pattern);
    }

    #[test]
    fn moderate_peak_is_stable() {
        let s = stats(aggregate(&DailyThresholds::default(), &series(&[10.0, 12.0, 14.0, 50.0], 2.0), "Home", now()));
        assert!((s.avg_pm25 - 21.5).abs() < 1e-9);
        assert_eq!(s.max_pm25, 50.0);
        assert_eq!(s.calm_hours, 0);
        assert!(!s.insights.spike_pattern);
        assert!(s.insights.stable_pattern);
    }

    #[test]
    fn unreadable_pm25_is_dropped_not_zeroed() {
        let rows = vec![
            sample(1, "Home", Some(30.0), Some(3.0)),
            sample(2, "Home", None, Some(3.0)),
            sample(3, "Home", Some(f64::NAN), Some(3.0)),
            sample(4, "Home", Some(20.0), Some(3.0)),
        ];
        let s = stats(aggregate(&DailyThresholds::default(), &rows, "Home", now()));
        assert!((s.avg_pm25 - 25.0).abs() < 1e-9);
        assert_eq!(s.sample_count, 4);
        assert!(!s.eu_violation);
    }

    #[test]
    fn rows_without_any_pm25_are_insufficient() {
        let rows = vec![sample(1, "Home", None, Some(1.0))];
        assert_eq!(
            aggregate(&DailyThresholds::default(), &rows, "Home", now()),
            DailyOutcome::InsufficientData
        );
    }

    #[test]
    fn long_calm_with_spike_sets_both_tags() {
        let mut rows = series(&[5.0; 9], 1.0);
        rows.push(sample(10, "Home", Some(100.0), Some(1.99)));
        let s = stats(aggregate(&DailyThresholds::default(), &rows, "Home", now()));
        assert_eq!(s.calm_hours, 10);
        assert!(s.insights.accumulation_pattern);
        assert!(s.insights.spike_pattern);
        assert!(!s.insights.stable_pattern);
    }

    #[test]
    fn mean_above_limit_is_violation() {
        let s = stats(aggregate(&DailyThresholds::default(), &series(&[26.0, 25.0, 25.5], 4.0), "Home", now()));
        assert!(s.eu_violation);
        assert_eq!(s.date, now().date_naive());
    }

    #[test]
    fn calm_cutoff_is_strict() {
        let rows = vec![
            sample(1, "Home", Some(5.0), Some(2.0)),
            sample(2, "Home", Some(5.0), Some(1.9)),
            sample(3, "Home", Some(5.0), None),
        ];
        assert_eq!(stats(aggregate(&DailyThresholds::default(), &rows, "Home", now())).calm_hours, 1);
    }
}
