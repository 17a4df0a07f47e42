mod archive;
mod config;
mod db;
mod engine;
mod error;
mod fetcher;
mod ingest;
mod monitor;
mod narrative;
mod report;
mod types;

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::{DbWriter, HistoryStore};
use crate::error::Result;
use crate::monitor::{local_now, DailyReporter, Monitor, RunMode};
use crate::narrative::gemini::GeminiClient;
use crate::narrative::NarrativeProvider;

#[derive(Parser)]
#[command(
    name = "aero-monitor",
    about = "Hourly air-quality risk assessment for a set of monitored locations"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Run the hourly monitor and daily reporter until stopped (default)
    Run,
    /// Run a single manual cycle (always narrates the primary target) and exit
    Once,
    /// Fetch and store hourly history between two dates, inclusive
    Backfill {
        /// First day, YYYY-MM-DD
        start: NaiveDate,
        /// Last day, YYYY-MM-DD
        end: NaiveDate,
    },
    /// Compute today's statistics for the primary target and print the report
    Daily,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg, cli.command.unwrap_or(Commands::Run)).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, command: Commands) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    let store = HistoryStore::new(pool);
    info!("Database ready at {}", cfg.db_path);

    if let Commands::Daily = command {
        let reporter = DailyReporter::new(cfg.clone(), store);
        println!("{}", reporter.report_once(local_now(&cfg)).await?);
        return Ok(());
    }

    // --- Writer task ---
    let (persist_tx, persist_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let writer = tokio::spawn(DbWriter::new(store.clone(), persist_rx).run());

    let monitor = Monitor::new(
        cfg.clone(),
        fetcher::http_client()?,
        store.clone(),
        persist_tx,
        narrator(&cfg)?,
    );

    match command {
        Commands::Run => {
            info!(
                "Monitoring {} target(s), primary {}, every {}s",
                cfg.targets.len(),
                cfg.primary_target,
                cfg.poll_interval_secs,
            );
            let reporter = DailyReporter::new(cfg.clone(), store);
            tokio::spawn(async move { reporter.run().await });
            monitor.run().await;
            return Ok(());
        }
        Commands::Once => {
            let summary = monitor.run_cycle(RunMode::Manual).await?;
            info!("Manual cycle: {} assessed, {} skipped", summary.assessed, summary.skipped);
        }
        Commands::Backfill { start, end } => {
            let stored = monitor.backfill(start, end).await?;
            info!("Backfill {start}..={end}: {stored} hourly rows queued");
        }
        Commands::Daily => {}
    }

    // Closing the last sender lets the writer drain and exit.
    drop(monitor);
    if let Err(e) = writer.await {
        warn!("DB writer task ended abnormally: {e}");
    }
    Ok(())
}

fn narrator(cfg: &Config) -> Result<Option<Arc<dyn NarrativeProvider>>> {
    match &cfg.gemini_api_key {
        Some(key) => {
            let provider: Arc<dyn NarrativeProvider> =
                Arc::new(GeminiClient::new(key.clone(), cfg.ai_model.clone())?);
            info!("Narrative provider: {}", cfg.ai_model);
            Ok(Some(provider))
        }
        None => {
            warn!("GEMINI_API_KEY not set; narratives disabled");
            Ok(None)
        }
    }
}
