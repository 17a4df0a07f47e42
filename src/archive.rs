//! Retention maintenance: expired rows move to CSV files, the AI log is capped.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;
use tracing::info;

use crate::db::HistoryStore;
use crate::error::Result;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ArchiveReport {
    pub observations: u64,
    pub assessments: u64,
    pub limit_checks: u64,
    pub summaries_trimmed: u64,
    pub files: Vec<PathBuf>,
}

/// `<prefix>_<YYYYMMDD_HHMM>.csv`
pub fn archive_path(dir: &Path, prefix: &str, now: DateTime<FixedOffset>) -> PathBuf {
    dir.join(format!("{prefix}_{}.csv", now.format("%Y%m%d_%H%M")))
}

/// Write `rows` with a header. Appends (without a second header) if a run in
/// the same minute already created the file. Writes nothing for no rows.
fn export<T: Serialize>(path: &Path, rows: &[T]) -> Result<bool> {
    if rows.is_empty() {
        return Ok(false);
    }
    let exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!exists)
        .from_writer(file);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(true)
}

fn last_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0)
}

pub async fn run_maintenance(
    store: &HistoryStore,
    dir: &Path,
    retention_days: u32,
    ai_log_max: u32,
    now: DateTime<FixedOffset>,
) -> Result<ArchiveReport> {
    let cutoff = (now - Duration::days(i64::from(retention_days))).timestamp();
    let mut report = ArchiveReport::default();

    let observations = store.observations_before(cutoff).await?;
    let assessments = store.assessments_before(cutoff).await?;
    let limit_checks = store.limit_checks_before(cutoff).await?;

    if !(observations.is_empty() && assessments.is_empty() && limit_checks.is_empty()) {
        fs::create_dir_all(dir)?;
    }

    // Export must succeed before the rows are deleted; only exported ids go.
    let path = archive_path(dir, "observations", now);
    if export(&path, &observations)? {
        report.observations = store
            .delete_observations_before(cutoff, last_id(observations.iter().map(|r| r.id)))
            .await?;
        report.files.push(path);
    }
    let path = archive_path(dir, "assessments", now);
    if export(&path, &assessments)? {
        report.assessments = store
            .delete_assessments_before(cutoff, last_id(assessments.iter().map(|r| r.id)))
            .await?;
        report.files.push(path);
    }
    let path = archive_path(dir, "limit_checks", now);
    if export(&path, &limit_checks)? {
        report.limit_checks = store
            .delete_limit_checks_before(cutoff, last_id(limit_checks.iter().map(|r| r.id)))
            .await?;
        report.files.push(path);
    }

    report.summaries_trimmed = store.trim_summaries(ai_log_max).await?;

    if !report.files.is_empty() || report.summaries_trimmed > 0 {
        info!(
            observations = report.observations,
            assessments = report.assessments,
            limit_checks = report.limit_checks,
            summaries_trimmed = report.summaries_trimmed,
            "[ARCHIVE] maintenance moved {} file(s) to {}",
            report.files.len(),
            dir.display(),
        );
    }
    Ok(report)
}
