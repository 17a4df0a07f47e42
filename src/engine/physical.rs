use crate::config::PhysicalThresholds;
use crate::types::{PhysicalRisks, Reading};

/// Evaluate the physical-process flags. Every rule runs unconditionally;
/// the scavenging gap is only ever considered inside wet deposition.
pub fn evaluate(t: &PhysicalThresholds, r: &Reading) -> PhysicalRisks {
    // Low mixing height and weak wind: nothing disperses.
    let stagnation = r.blh < t.stagnation_blh_m && r.gust < t.stagnation_gust_kmh;

    let (wet_deposition, scavenging_gap) = if r.precip > t.wet_precip_mm {
        // Rain removes coarse matter; fine particles left behind are residual risk.
        (true, r.pm25 >= t.scavenging_pm25)
    } else {
        (false, false)
    };

    let o3_generation = r.uv >= t.o3_uv_index && r.temp >= t.o3_temp_c && r.no2 >= t.o3_no2;

    let sia_conversion = r.hum >= t.sia_humidity_pct && r.dust >= t.sia_dust;

    // Clean surface under a loaded column: a plume aloft that has not mixed down.
    let transboundary_aloft = r.pm25 <= t.transboundary_pm25 && r.aod >= t.transboundary_aod;

    PhysicalRisks {
        stagnation,
        wet_deposition,
        scavenging_gap,
        o3_generation,
        sia_conversion,
        transboundary_aloft,
    }
}
