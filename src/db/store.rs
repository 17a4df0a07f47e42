use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::config::KMH_PER_MS;
use crate::db::models::{
    AssessmentRow, DailyStatsRow, LimitCheckRow, NewObservation, NewSummary, ObservationRow,
    SummaryRow,
};
use crate::error::Result;
use crate::types::{DailyStats, HistoricalSample, LimitCheck, RiskAssessment};

/// Typed access to the historical tables. Cheap to clone (wraps the pool).
#[derive(Debug, Clone)]
pub struct HistoryStore {
    pool: sqlx::SqlitePool,
}

impl HistoryStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    // -----------------------------------------------------------------------
    // Hourly writes
    // -----------------------------------------------------------------------

    /// Same location and hour replaces the earlier row (backfill re-runs).
    pub async fn insert_observation(&self, o: &NewObservation) -> Result<()> {
        let s = &o.sample;
        let wind_speed = s.wind_gusts_10m.map(|g| g / KMH_PER_MS);
        let signal = o.signal.signal.to_string();

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO observations (
                observed_at, observed_local, location,
                pm25, pm10, no2, so2, o3, co, nh3, dust, aod,
                temp, hum, precip, gust, wind_speed, blh, uv, pressure_msl,
                signal, reason, defaulted
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(o.observed_at.timestamp())
        .bind(o.observed_at.to_rfc3339())
        .bind(&o.location)
        .bind(s.pm2_5)
        .bind(s.pm10)
        .bind(s.nitrogen_dioxide)
        .bind(s.sulphur_dioxide)
        .bind(s.ozone)
        .bind(s.carbon_monoxide)
        .bind(s.ammonia)
        .bind(s.dust)
        .bind(s.aerosol_optical_depth)
        .bind(s.temperature_2m)
        .bind(s.relative_humidity_2m)
        .bind(s.precipitation)
        .bind(s.wind_gusts_10m)
        .bind(wind_speed)
        .bind(s.boundary_layer_height)
        .bind(s.uv_index)
        .bind(s.pressure_msl)
        .bind(signal)
        .bind(&o.signal.reason)
        .bind(o.defaulted.join(","))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// One assessment per location and hour; a re-run replaces it.
    pub async fn insert_assessment(&self, a: &RiskAssessment) -> Result<()> {
        let payload = serde_json::to_string(a)?;
        let primary = a
            .aqi
            .primary_pollutants
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let violations = a.compliance.violations.join("; ");
        let flags = a.physical.active().join(",");

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO assessments (
                observed_at, observed_local, location,
                overall_level, overall_status, primary_pollutants,
                sensitive_alert, limit_exceeded, violations, physical_flags, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(a.timestamp.timestamp())
        .bind(a.timestamp.to_rfc3339())
        .bind(&a.location)
        .bind(i64::from(a.aqi.overall_level))
        .bind(a.aqi.overall_status.label())
        .bind(primary)
        .bind(i64::from(a.aqi.sensitive_alert_active))
        .bind(i64::from(a.compliance.limit_exceeded))
        .bind(violations)
        .bind(flags)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Keyed by location and `at`, like assessments.
    pub async fn insert_limit_check(&self, at: DateTime<FixedOffset>, c: &LimitCheck) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO limit_checks (checked_at, checked_local, location, status, detail) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(at.timestamp())
        .bind(at.to_rfc3339())
        .bind(&c.location)
        .bind(c.status.to_string())
        .bind(&c.detail)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_summary(&self, s: &NewSummary) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_summaries (created_at, kind, location, model, content) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(s.created_at.timestamp())
        .bind(s.kind.to_string())
        .bind(&s.location)
        .bind(&s.model)
        .bind(&s.content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One daily report per location and day: drops any daily summary for
    /// `s.location` created at or after `day_start`, then inserts `s`.
    pub async fn replace_daily_summary(&self, s: &NewSummary, day_start: DateTime<FixedOffset>) -> Result<()> {
        sqlx::query("DELETE FROM ai_summaries WHERE kind = ? AND location = ? AND created_at >= ?")
            .bind(s.kind.to_string())
            .bind(&s.location)
            .bind(day_start.timestamp())
            .execute(&self.pool)
            .await?;
        self.insert_summary(s).await
    }

    // -----------------------------------------------------------------------
    // Daily aggregation
    // -----------------------------------------------------------------------

    /// `(observed_at, location, pm25, wind_speed)` for one location since `since`,
    /// with timestamps expressed in `since`'s offset.
    pub async fn samples_since(
        &self,
        location: &str,
        since: DateTime<FixedOffset>,
    ) -> Result<Vec<HistoricalSample>> {
        let rows: Vec<(i64, String, Option<f64>, Option<f64>)> = sqlx::query_as(
            r#"
            SELECT observed_at, location, pm25, wind_speed
            FROM observations
            WHERE location = ? AND observed_at >= ?
            ORDER BY observed_at
            "#,
        )
        .bind(location)
        .bind(since.timestamp())
        .fetch_all(&self.pool)
        .await?;

        let offset = *since.offset();
        Ok(rows
            .into_iter()
            .filter_map(|(secs, location, pm25, wind_speed)| {
                let observed_at = offset.timestamp_opt(secs, 0).single()?;
                Some(HistoricalSample {
                    observed_at,
                    location,
                    pm25,
                    wind_speed,
                })
            })
            .collect())
    }

    pub async fn upsert_daily_stats(&self, s: &DailyStats) -> Result<()> {
        let date = s.date.format("%Y-%m-%d").to_string();
        let sample_count = s.sample_count as i64;

        sqlx::query(
            r#"
            INSERT INTO daily_stats (
                date, location, avg_pm25, max_pm25, calm_hours, sample_count,
                eu_violation, accumulation, spike, stable, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(date, location) DO UPDATE SET
                avg_pm25 = excluded.avg_pm25,
                max_pm25 = excluded.max_pm25,
                calm_hours = excluded.calm_hours,
                sample_count = excluded.sample_count,
                eu_violation = excluded.eu_violation,
                accumulation = excluded.accumulation,
                spike = excluded.spike,
                stable = excluded.stable,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(date)
        .bind(&s.location)
        .bind(s.avg_pm25)
        .bind(s.max_pm25)
        .bind(i64::from(s.calm_hours))
        .bind(sample_count)
        .bind(i64::from(s.eu_violation))
        .bind(i64::from(s.insights.accumulation_pattern))
        .bind(i64::from(s.insights.spike_pattern))
        .bind(i64::from(s.insights.stable_pattern))
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn daily_stats(&self, date: &str, location: &str) -> Result<Option<DailyStatsRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM daily_stats WHERE date = ? AND location = ?")
                .bind(date)
                .bind(location)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // -----------------------------------------------------------------------
    // Retention
    //
    // Deletes take the highest exported id so rows written after the export
    // (new ids, including same-key replacements) survive until the next pass.
    // -----------------------------------------------------------------------

    pub async fn observations_before(&self, cutoff: i64) -> Result<Vec<ObservationRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM observations WHERE observed_at < ? ORDER BY observed_at, id")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn delete_observations_before(&self, cutoff: i64, through_id: i64) -> Result<u64> {
        let r = sqlx::query("DELETE FROM observations WHERE observed_at < ? AND id <= ?")
            .bind(cutoff)
            .bind(through_id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    pub async fn assessments_before(&self, cutoff: i64) -> Result<Vec<AssessmentRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM assessments WHERE observed_at < ? ORDER BY observed_at, id")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn delete_assessments_before(&self, cutoff: i64, through_id: i64) -> Result<u64> {
        let r = sqlx::query("DELETE FROM assessments WHERE observed_at < ? AND id <= ?")
            .bind(cutoff)
            .bind(through_id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    pub async fn limit_checks_before(&self, cutoff: i64) -> Result<Vec<LimitCheckRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM limit_checks WHERE checked_at < ? ORDER BY checked_at, id")
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn delete_limit_checks_before(&self, cutoff: i64, through_id: i64) -> Result<u64> {
        let r = sqlx::query("DELETE FROM limit_checks WHERE checked_at < ? AND id <= ?")
            .bind(cutoff)
            .bind(through_id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Newest first.
    pub async fn summaries(&self) -> Result<Vec<SummaryRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM ai_summaries ORDER BY created_at DESC, id DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Keep the newest `keep` summaries, delete the rest.
    pub async fn trim_summaries(&self, keep: u32) -> Result<u64> {
        let r = sqlx::query(
            r#"
            DELETE FROM ai_summaries WHERE id NOT IN (
                SELECT id FROM ai_summaries ORDER BY created_at DESC, id DESC LIMIT ?
            )
            "#,
        )
        .bind(i64::from(keep))
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}
