use std::collections::BTreeMap;

use crate::config::BandTable;
use crate::engine::classifier::classify;
use crate::types::{AqiAssessment, AqiBand, Pollutant, Reading};

/// Overall level at or above which vulnerable-group alerting is on.
/// Narrative gating downstream depends on this value.
pub const SENSITIVE_ALERT_LEVEL: u8 = 2;

/// Worst pollutant governs: overall level is the max across all five.
///
/// Primary pollutants are every pollutant sitting at that max. A strictly
/// greater level resets the list, an equal level appends, and level-0 ties
/// never append, so an all-Good reading reports none.
pub fn assess_aqi(bands: &BandTable, reading: &Reading) -> AqiAssessment {
    let mut per_pollutant_levels = BTreeMap::new();
    let mut max_level = 0u8;
    let mut primary = Vec::new();

    for pollutant in Pollutant::ALL {
        let level = classify(bands, pollutant, reading.concentration(pollutant));
        per_pollutant_levels.insert(pollutant, level);

        if level > max_level {
            max_level = level;
            primary.clear();
            primary.push(pollutant);
        } else if level == max_level && max_level > 0 {
            primary.push(pollutant);
        }
    }

    AqiAssessment {
        overall_level: max_level,
        overall_status: AqiBand::from_level(max_level),
        primary_pollutants: primary,
        sensitive_alert_active: max_level >= SENSITIVE_ALERT_LEVEL,
        per_pollutant_levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pm25: f64, pm10: f64, no2: f64, o3: f64, so2: f64) -> Reading {
        Reading { pm25, pm10, no2, o3, so2, ..Reading::default() }
    }

    #[test]
    fn pm25_alone_drives_moderate() {
        let a = assess_aqi(&BandTable::default(), &reading(30.0, 10.0, 10.0, 10.0, 10.0));
        assert_eq!(a.overall_level, 2);
        assert_eq!(a.overall_status, AqiBand::Moderate);
        assert!(a.sensitive_alert_active);
        assert_eq!(a.primary_pollutants, vec![Pollutant::Pm25]);
    }

    #[test]
    fn all_good_has_no_primary_pollutant() {
        let a = assess_aqi(&BandTable::default(), &Reading::default());
        assert_eq!(a.overall_level, 0);
        assert_eq!(a.overall_status, AqiBand::Good);
        assert!(a.primary_pollutants.is_empty());
        assert!(!a.sensitive_alert_active);
    }

    #[test]
    fn ties_are_all_reported_in_order() {
        // pm25 12 → 1, pm10 40 → 1, no2 5 → 0, o3 90 → 1, so2 5 → 0
        let a = assess_aqi(&BandTable::default(), &reading(12.0, 40.0, 5.0, 90.0, 5.0));
        assert_eq!(a.overall_level, 1);
        assert_eq!(
            a.primary_pollutants,
            vec![Pollutant::Pm25, Pollutant::Pm10, Pollutant::O3]
        );
        assert!(!a.sensitive_alert_active);
    }

    #[test]
    fn later_higher_level_resets_primary_list() {
        // pm25 12 → 1, pm10 40 → 1, so2 200 → 4
        let a = assess_aqi(&BandTable::default(), &reading(12.0, 40.0, 0.0, 0.0, 200.0));
        assert_eq!(a.overall_level, 4);
        assert_eq!(a.primary_pollutants, vec![Pollutant::So2]);
    }

    #[test]
    fn overall_is_max_of_per_pollutant_levels() {
        let samples = [
            reading(3.0, 100.0, 70.0, 110.0, 30.0),
            reading(150.0, 0.0, 0.0, 0.0, 0.0),
            reading(16.0, 46.0, 26.0, 101.0, 41.0),
        ];
        for r in samples {
            let a = assess_aqi(&BandTable::default(), &r);
            let max = *a.per_pollutant_levels.values().max().unwrap();
            assert_eq!(a.overall_level, max);
            let expected: Vec<Pollutant> = Pollutant::ALL
                .into_iter()
                .filter(|p| a.per_pollutant_levels[p] == max)
                .collect();
            assert_eq!(a.primary_pollutants, expected);
        }
    }

    #[test]
    fn sensitive_alert_threshold_is_moderate() {
        let fair = assess_aqi(&BandTable::default(), &reading(15.0, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(fair.overall_level, 1);
        assert!(!fair.sensitive_alert_active);

        let moderate = assess_aqi(&BandTable::default(), &reading(15.01, 0.0, 0.0, 0.0, 0.0));
        assert_eq!(moderate.overall_level, 2);
        assert!(moderate.sensitive_alert_active);
    }
}
