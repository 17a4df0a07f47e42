use super::round2;
use crate::config::LegacyThresholds;
use crate::types::{LegacySignal, Signal};

/// Quick three-tier signal over PM2.5, NO2 and SO2 only.
///
/// Every RED tier is evaluated and contributes a reason. YELLOW is only
/// considered when nothing is RED, and stops at the first match (PM2.5
/// before NO2). SO2 has no YELLOW tier.
pub fn strict_signal(t: &LegacyThresholds, pm25: f64, no2: f64, so2: f64) -> LegacySignal {
    let (p, n, s) = (round2(pm25), round2(no2), round2(so2));

    let mut reasons = Vec::new();
    let mut signal = Signal::Green;

    if p >= t.red_pm25 {
        signal = Signal::Red;
        reasons.push(format!("PM2.5({p})"));
    }
    if n >= t.red_no2 {
        signal = Signal::Red;
        reasons.push(format!("NO2({n})"));
    }
    if s >= t.red_so2 {
        signal = Signal::Red;
        reasons.push(format!("SO2({s})"));
    }

    if signal != Signal::Red {
        if p >= t.yellow_pm25 {
            signal = Signal::Yellow;
            reasons.push(format!("PM2.5({p})"));
        } else if n >= t.yellow_no2 {
            signal = Signal::Yellow;
            reasons.push(format!("NO2({n})"));
        }
    }

    let reason = if reasons.is_empty() {
        "Safe levels".to_string()
    } else {
        format!("Alert: {}", reasons.join(", "))
    };

    LegacySignal { signal, reason }
}
