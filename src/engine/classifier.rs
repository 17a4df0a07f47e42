use crate::config::BandTable;
use crate::types::Pollutant;

/// Highest level a band table can yield.
pub const TOP_LEVEL: u8 = 5;

/// Map a concentration to its band level.
///
/// Bands are inclusive on their upper edge: the first bound `>= value` wins.
/// Negative values land in level 0; values above every finite bound (or NaN)
/// land in the top level.
pub fn classify(bands: &BandTable, pollutant: Pollutant, value: f64) -> u8 {
    bands
        .bands(pollutant)
        .iter()
        .position(|&upper| value <= upper)
        .map_or(TOP_LEVEL, |i| i as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_bound_is_inclusive_for_every_band() {
        let table = BandTable::default();
        for p in Pollutant::ALL {
            for (i, &upper) in table.bands(p).iter().enumerate().take(5) {
                assert_eq!(classify(&table, p, upper), i as u8, "{p} at {upper}");
                assert_eq!(classify(&table, p, upper + 0.001), i as u8 + 1, "{p} above {upper}");
            }
        }
    }

    #[test]
    fn one_unit_above_top_finite_bound_is_level_five() {
        let table = BandTable::default();
        assert_eq!(classify(&table, Pollutant::Pm25, 141.0), 5);
        assert_eq!(classify(&table, Pollutant::Pm10, 271.0), 5);
        assert_eq!(classify(&table, Pollutant::No2, 151.0), 5);
        assert_eq!(classify(&table, Pollutant::O3, 181.0), 5);
        assert_eq!(classify(&table, Pollutant::So2, 276.0), 5);
    }

    #[test]
    fn negative_and_zero_are_good() {
        let table = BandTable::default();
        assert_eq!(classify(&table, Pollutant::Pm25, -3.0), 0);
        assert_eq!(classify(&table, Pollutant::O3, 0.0), 0);
    }

    #[test]
    fn pm25_thirty_is_moderate() {
        assert_eq!(classify(&BandTable::default(), Pollutant::Pm25, 30.0), 2);
    }

    #[test]
    fn nan_saturates_to_top() {
        assert_eq!(classify(&BandTable::default(), Pollutant::No2, f64::NAN), TOP_LEVEL);
    }

    #[test]
    fn custom_table_is_honoured() {
        let table = BandTable {
            pm25: [1.0, 2.0, 3.0, 4.0, 5.0, f64::INFINITY],
            ..BandTable::default()
        };
        assert_eq!(classify(&table, Pollutant::Pm25, 3.5), 3);
    }
}
