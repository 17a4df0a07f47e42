use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::config::{Config, Target};
use crate::db::models::{NewObservation, NewSummary, SummaryKind};
use crate::db::{HistoryStore, PersistEvent};
use crate::engine::daily::local_midnight;
use crate::engine::RiskEngine;
use crate::error::{AppError, Result};
use crate::fetcher;
use crate::ingest::{Supplementary, UpstreamSample};
use crate::narrative::{prompt, NarrativeProvider};
use crate::report;
use crate::types::{DailyOutcome, LegacySignal, RiskAssessment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Scheduled,
    /// Operator-triggered; always narrates the primary target.
    Manual,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub assessed: usize,
    pub skipped: usize,
}

/// Start of the hour containing `t`; observations are keyed per hour.
fn hour_start(t: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

pub fn local_now(cfg: &Config) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&cfg.local_offset)
}

// ---------------------------------------------------------------------------
// Hourly cycle
// ---------------------------------------------------------------------------

pub struct Monitor {
    cfg: Config,
    engine: RiskEngine,
    client: reqwest::Client,
    store: HistoryStore,
    persist_tx: mpsc::Sender<PersistEvent>,
    narrator: Option<Arc<dyn NarrativeProvider>>,
}

impl Monitor {
    pub fn new(
        cfg: Config,
        client: reqwest::Client,
        store: HistoryStore,
        persist_tx: mpsc::Sender<PersistEvent>,
        narrator: Option<Arc<dyn NarrativeProvider>>,
    ) -> Self {
        let engine = RiskEngine::new(cfg.thresholds.clone());
        Self { cfg, engine, client, store, persist_tx, narrator }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.poll_interval_secs));

        loop {
            // First tick fires immediately: assess on startup.
            ticker.tick().await;
            if let Err(e) = self.run_cycle(RunMode::Scheduled).await {
                error!("Monitor cycle failed: {e}");
            }
        }
    }

    pub async fn run_cycle(&self, mode: RunMode) -> Result<CycleSummary> {
        let now = local_now(&self.cfg);
        let samples = fetcher::fetch_current(&self.client, &self.cfg, now).await?;

        let mut summary = CycleSummary::default();
        for (target, sample) in &samples {
            match self.process_target(target, sample, now, mode).await {
                Ok(true) => summary.assessed += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.skipped += 1;
                    error!(location = %target.name, "Assessment failed: {e}");
                }
            }
        }

        if let Err(e) = archive::run_maintenance(
            &self.store,
            &self.cfg.archive_dir,
            self.cfg.retention_days,
            self.cfg.ai_log_max,
            now,
        )
        .await
        {
            error!("Archive maintenance failed: {e}");
        }

        info!(
            mode = ?mode,
            assessed = summary.assessed,
            skipped = summary.skipped,
            "[CYCLE] complete"
        );
        Ok(summary)
    }

    /// Returns `false` when the target had no upstream data at all.
    async fn process_target(
        &self,
        target: &Target,
        sample: &UpstreamSample,
        now: DateTime<FixedOffset>,
        mode: RunMode,
    ) -> Result<bool> {
        if sample.is_empty() {
            warn!(location = %target.name, "No upstream data, skipping target");
            return Ok(false);
        }

        let observed_at = hour_start(now);
        let normalized = sample.normalize();
        if !normalized.defaulted.is_empty() {
            warn!(
                location = %target.name,
                fields = ?normalized.defaulted,
                "Upstream omitted {} field(s); defaults applied",
                normalized.defaulted.len(),
            );
        }
        let reading = normalized.reading;

        let assessment = self.engine.assess(&target.name, observed_at, reading)?;
        let signal = self.engine.legacy_signal(&reading);
        let check = self.engine.daily_limit_check(&target.name, &reading);

        info!(
            event = "ASSESSMENT",
            location = %target.name,
            level = assessment.aqi.overall_level,
            status = %assessment.aqi.overall_status,
            limit_exceeded = assessment.compliance.limit_exceeded,
            risks = ?assessment.physical.active(),
            "{}",
            report::status_line(&target.name, &signal),
        );

        self.persist(PersistEvent::Observation(NewObservation {
            observed_at,
            location: target.name.clone(),
            sample: sample.clone(),
            signal: signal.clone(),
            defaulted: normalized.defaulted.clone(),
        }))
        .await;
        self.persist(PersistEvent::Assessment(Box::new(assessment.clone()))).await;
        self.persist(PersistEvent::LimitCheck { checked_at: observed_at, check }).await;

        let wants_narrative = mode == RunMode::Manual || assessment.is_risk();
        if target.id == self.cfg.primary_target && wants_narrative {
            self.narrate(&assessment, &signal, &normalized.supplementary, now).await;
        }

        Ok(true)
    }

    async fn narrate(
        &self,
        assessment: &RiskAssessment,
        signal: &LegacySignal,
        supplementary: &Supplementary,
        now: DateTime<FixedOffset>,
    ) {
        let Some(narrator) = &self.narrator else {
            debug!("Narrative provider not configured");
            return;
        };

        let context = match prompt::build_context(assessment, signal, supplementary) {
            Ok(c) => c,
            Err(e) => {
                error!("Prompt build failed: {e}");
                return;
            }
        };

        match narrator.generate(&context, prompt::system_instruction()).await {
            Ok(Some(text)) => {
                info!(location = %assessment.location, provider = narrator.name(), "[NARRATIVE] generated");
                self.persist(PersistEvent::Summary(NewSummary {
                    created_at: now,
                    kind: SummaryKind::Hourly,
                    location: assessment.location.clone(),
                    model: narrator.name().to_string(),
                    content: text,
                }))
                .await;
            }
            Ok(None) => warn!(location = %assessment.location, "[NARRATIVE] provider returned no text"),
            Err(e) => error!(location = %assessment.location, "[NARRATIVE] {e}"),
        }
    }

    async fn persist(&self, event: PersistEvent) {
        if let Err(e) = self.persist_tx.send(event).await {
            warn!("DB writer channel closed: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Backfill
    // -----------------------------------------------------------------------

    /// Fetch and store hourly history for every target between two dates
    /// (inclusive). The first failing target aborts the run.
    pub async fn backfill(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        if start > end {
            return Err(AppError::Config(format!("backfill start {start} is after end {end}")));
        }

        let mut stored = 0;
        for target in &self.cfg.targets {
            let rows = fetcher::fetch_range(&self.client, &self.cfg, target, start, end).await?;
            info!(location = %target.name, hours = rows.len(), "[BACKFILL] fetched");

            for (hour, sample) in rows {
                let Some(observed_at) = self.cfg.local_offset.from_local_datetime(&hour).single()
                else {
                    continue;
                };
                if sample.is_empty() {
                    continue;
                }
                let normalized = sample.normalize();
                let assessment = self.engine.assess(&target.name, observed_at, normalized.reading)?;
                let signal = self.engine.legacy_signal(&normalized.reading);

                self.persist(PersistEvent::Observation(NewObservation {
                    observed_at,
                    location: target.name.clone(),
                    sample,
                    signal,
                    defaulted: normalized.defaulted,
                }))
                .await;
                self.persist(PersistEvent::Assessment(Box::new(assessment))).await;
                stored += 1;
            }
        }
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Daily report
// ---------------------------------------------------------------------------

/// Background task that recomputes today's statistics for the primary
/// target and keeps one rendered daily report per day in the AI log.
pub struct DailyReporter {
    cfg: Config,
    engine: RiskEngine,
    store: HistoryStore,
}

impl DailyReporter {
    pub fn new(cfg: Config, store: HistoryStore) -> Self {
        let engine = RiskEngine::new(cfg.thresholds.clone());
        Self { cfg, engine, store }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.daily_report_interval_secs));
        ticker.tick().await; // skip immediate first tick, no rows yet

        loop {
            ticker.tick().await;
            if let Err(e) = self.report_once(local_now(&self.cfg)).await {
                error!("Daily report failed: {e}");
            }
        }
    }

    pub async fn report_once(&self, now: DateTime<FixedOffset>) -> Result<String> {
        let location = self
            .cfg
            .primary()
            .map(|t| t.name.clone())
            .ok_or_else(|| AppError::Config("primary target not configured".to_string()))?;

        let day_start = local_midnight(now);
        let samples = self.store.samples_since(&location, day_start).await?;
        let outcome = self.engine.daily(&samples, &location, now);
        let text = report::render_daily_report(&outcome);

        match &outcome {
            DailyOutcome::InsufficientData => {
                warn!(location = %location, rows = samples.len(), "[DAILY] insufficient data");
            }
            DailyOutcome::Stats(stats) => {
                self.store.upsert_daily_stats(stats).await?;
                self.store
                    .replace_daily_summary(
                        &NewSummary {
                            created_at: now,
                            kind: SummaryKind::Daily,
                            location: location.clone(),
                            model: "daily-report".to_string(),
                            content: text.clone(),
                        },
                        day_start,
                    )
                    .await?;
                info!(
                    location = %location,
                    avg_pm25 = stats.avg_pm25,
                    max_pm25 = stats.max_pm25,
                    calm_hours = stats.calm_hours,
                    eu_violation = stats.eu_violation,
                    "[DAILY] stats updated"
                );
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::db::{test_pool, DbWriter};
    use crate::report::INSUFFICIENT_DATA_TEXT;

    struct CountingNarrator {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl NarrativeProvider for CountingNarrator {
        async fn generate(&self, user_prompt: &str, system_instruction: &str) -> Result<Option<String>> {
            assert!(user_prompt.contains("Engine output"));
            assert!(!system_instruction.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("### 🛡️ Tactical Report".to_string()))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 12, 1, hour, minute, 0)
            .unwrap()
    }

    fn sample(pm25: f64, gust: f64) -> UpstreamSample {
        UpstreamSample {
            pm2_5: Some(pm25),
            pm10: Some(5.0),
            nitrogen_dioxide: Some(5.0),
            sulphur_dioxide: Some(1.0),
            ozone: Some(20.0),
            wind_gusts_10m: Some(gust),
            boundary_layer_height: Some(1200.0),
            ..UpstreamSample::default()
        }
    }

    struct Harness {
        monitor: Monitor,
        store: HistoryStore,
        narrator: Arc<CountingNarrator>,
        writer: tokio::task::JoinHandle<()>,
    }

    async fn harness() -> Harness {
        let cfg = Config::for_tests();
        let store = HistoryStore::new(test_pool().await);
        let (tx, rx) = mpsc::channel(64);
        let writer = tokio::spawn(DbWriter::new(store.clone(), rx).run());
        let narrator = Arc::new(CountingNarrator { calls: AtomicUsize::new(0) });
        let monitor = Monitor::new(
            cfg,
            reqwest::Client::new(),
            store.clone(),
            tx,
            Some(narrator.clone() as Arc<dyn NarrativeProvider>),
        );
        Harness { monitor, store, narrator, writer }
    }

    impl Harness {
        /// Drop the sender side and wait for every queued write.
        async fn flush(self) -> (HistoryStore, Arc<CountingNarrator>) {
            drop(self.monitor);
            self.writer.await.unwrap();
            (self.store, self.narrator)
        }
    }

    fn target(id: &str, name: &str) -> Target {
        Target { id: id.into(), name: name.into(), lat: 35.0, lon: 136.0 }
    }

    #[test]
    fn hour_start_truncates() {
        assert_eq!(hour_start(at(14, 42)), at(14, 0));
    }

    #[tokio::test]
    async fn risky_primary_target_is_narrated_and_persisted() {
        let h = harness().await;
        let ok = h
            .monitor
            .process_target(&target("HOME", "Home"), &sample(30.0, 20.0), at(14, 42), RunMode::Scheduled)
            .await
            .unwrap();
        assert!(ok);
        let (store, narrator) = h.flush().await;

        assert_eq!(narrator.calls.load(Ordering::SeqCst), 1);
        let cutoff = at(23, 0).timestamp();
        let obs = store.observations_before(cutoff).await.unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs[0].observed_at, at(14, 0).timestamp());
        assert_eq!(obs[0].signal, "RED");
        assert_eq!(store.assessments_before(cutoff).await.unwrap().len(), 1);
        let checks = store.limit_checks_before(cutoff).await.unwrap();
        assert_eq!(checks[0].status, "WARNING");
        let summaries = store.summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].kind, "hourly");
        assert_eq!(summaries[0].model, "counting");
    }

    #[tokio::test]
    async fn clean_air_is_not_narrated_unless_manual() {
        let h = harness().await;
        let home = target("HOME", "Home");
        h.monitor.process_target(&home, &sample(3.0, 20.0), at(9, 0), RunMode::Scheduled).await.unwrap();
        assert_eq!(h.narrator.calls.load(Ordering::SeqCst), 0);

        h.monitor.process_target(&home, &sample(3.0, 20.0), at(10, 0), RunMode::Manual).await.unwrap();
        assert_eq!(h.narrator.calls.load(Ordering::SeqCst), 1);
        h.flush().await;
    }

    #[tokio::test]
    async fn rerun_in_same_hour_keeps_one_row_per_table() {
        let h = harness().await;
        let univ = target("UNIV", "Univ");
        h.monitor.process_target(&univ, &sample(3.0, 20.0), at(9, 5), RunMode::Scheduled).await.unwrap();
        h.monitor.process_target(&univ, &sample(30.0, 20.0), at(9, 50), RunMode::Manual).await.unwrap();
        let (store, _) = h.flush().await;

        let cutoff = at(23, 0).timestamp();
        assert_eq!(store.observations_before(cutoff).await.unwrap().len(), 1);
        let assessments = store.assessments_before(cutoff).await.unwrap();
        assert_eq!(assessments.len(), 1);
        assert_eq!(assessments[0].limit_exceeded, 1);
        let checks = store.limit_checks_before(cutoff).await.unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].checked_at, at(9, 0).timestamp());
        assert_eq!(checks[0].status, "WARNING");
    }

    #[tokio::test]
    async fn other_targets_are_never_narrated() {
        let h = harness().await;
        h.monitor
            .process_target(&target("UNIV", "Univ"), &sample(80.0, 20.0), at(9, 0), RunMode::Manual)
            .await
            .unwrap();
        let (store, narrator) = h.flush().await;
        assert_eq!(narrator.calls.load(Ordering::SeqCst), 0);
        assert!(store.summaries().await.unwrap().is_empty());
        assert_eq!(store.observations_before(at(23, 0).timestamp()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_sample_is_skipped() {
        let h = harness().await;
        let ok = h
            .monitor
            .process_target(&target("HOME", "Home"), &UpstreamSample::default(), at(9, 0), RunMode::Manual)
            .await
            .unwrap();
        assert!(!ok);
        let (store, _) = h.flush().await;
        assert!(store.observations_before(at(23, 0).timestamp()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn daily_report_upserts_stats_and_keeps_one_summary() {
        let h = harness().await;
        let home = target("HOME", "Home");
        for (hour, pm25) in [(1, 10.0), (2, 10.0), (3, 10.0), (4, 60.0)] {
            h.monitor.process_target(&home, &sample(pm25, 10.0), at(hour, 5), RunMode::Scheduled).await.unwrap();
        }
        let (store, _) = h.flush().await;

        let reporter = DailyReporter::new(Config::for_tests(), store.clone());
        let text = reporter.report_once(at(12, 0)).await.unwrap();
        assert!(text.contains("22.50"));
        assert!(text.contains("[Spike exposure]"));
        reporter.report_once(at(13, 0)).await.unwrap();

        let row = store.daily_stats("2025-12-01", "Home").await.unwrap().unwrap();
        assert_eq!(row.sample_count, 4);
        assert_eq!(row.spike, 1);
        assert_eq!(row.calm_hours, 0);

        let daily: Vec<_> = store
            .summaries()
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.kind == "daily")
            .collect();
        assert_eq!(daily.len(), 1);
    }

    #[tokio::test]
    async fn daily_report_without_rows_is_insufficient() {
        let store = HistoryStore::new(test_pool().await);
        let reporter = DailyReporter::new(Config::for_tests(), store.clone());
        assert_eq!(reporter.report_once(at(12, 0)).await.unwrap(), INSUFFICIENT_DATA_TEXT);
        assert!(store.daily_stats("2025-12-01", "Home").await.unwrap().is_none());
        assert!(store.summaries().await.unwrap().is_empty());
    }
}
