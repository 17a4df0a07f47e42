//! Plain-text rendering of daily statistics and the hourly status line.

use std::fmt::Write;

use crate::types::{DailyInsights, DailyOutcome, DailyStats, LegacySignal, Signal};

pub const INSUFFICIENT_DATA_TEXT: &str = "Insufficient data: no observations recorded today.";

const ACCUMULATION_TEXT: &str = ">> [Accumulation] Prolonged stagnation observed. Local emissions did not disperse and raised the baseline concentration.";
const SPIKE_TEXT: &str = ">> [Spike exposure] Peak far above the daily mean. Suggests a short transboundary plume or a nearby transient combustion event.";
const STABLE_TEXT: &str = ">> [Stable] Mixing and advection were normal; concentrations stayed steady.";

const VIOLATION_ADVICE: &str = "⚠️ 24h mean exceeds the EU legal limit. Keep the air purifier running and check the filter for clogging.";
const COMPLIANT_ADVICE: &str = "✅ Stayed within the legal limit all day. Good air quality.";

pub fn insight_lines(insights: &DailyInsights) -> Vec<&'static str> {
    let mut lines = Vec::new();
    if insights.accumulation_pattern {
        lines.push(ACCUMULATION_TEXT);
    }
    if insights.spike_pattern {
        lines.push(SPIKE_TEXT);
    }
    if insights.stable_pattern {
        lines.push(STABLE_TEXT);
    }
    lines
}

pub fn render_daily_report(outcome: &DailyOutcome) -> String {
    match outcome {
        DailyOutcome::InsufficientData => INSUFFICIENT_DATA_TEXT.to_string(),
        DailyOutcome::Stats(stats) => render_stats(stats),
    }
}

fn render_stats(s: &DailyStats) -> String {
    let verdict = if s.eu_violation { "⚠️ exceeded" } else { "✅ compliant" };
    let advice = if s.eu_violation { VIOLATION_ADVICE } else { COMPLIANT_ADVICE };

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "### 📊 AERO Daily Environmental Report");
    let _ = writeln!(out, "Date: {}", s.date.format("%Y/%m/%d"));
    let _ = writeln!(out, "Location: {}", s.location);
    let _ = writeln!(out);
    let _ = writeln!(out, "#### 1. Air quality metrics");
    let _ = writeln!(out, "- **24h mean PM2.5**: {:.2} μg/m³ ({verdict})", s.avg_pm25);
    let _ = writeln!(out, "- **Daily max PM2.5**: {:.2} μg/m³", s.max_pm25);
    let _ = writeln!(
        out,
        "- **Calm hours**: {} h / {} h (accumulation risk)",
        s.calm_hours, s.sample_count
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "#### 2. Meteorological insights");
    for line in insight_lines(&s.insights) {
        let _ = writeln!(out, "{line}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "#### 3. Advice");
    let _ = write!(out, "{advice}");
    out
}

/// One-line status for logs, e.g. `🔴 RED | Home | Alert: PM2.5(30)`.
pub fn status_line(location: &str, signal: &LegacySignal) -> String {
    let icon = match signal.signal {
        Signal::Red => "🔴",
        Signal::Yellow => "🟡",
        Signal::Green => "🟢",
    };
    format!("{icon} {} | {location} | {}", signal.signal, signal.reason)
}
