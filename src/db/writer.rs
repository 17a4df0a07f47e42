use chrono::{DateTime, FixedOffset};
use tokio::sync::mpsc;
use tracing::error;

use crate::db::models::{NewObservation, NewSummary};
use crate::db::HistoryStore;
use crate::error::Result;
use crate::types::{LimitCheck, RiskAssessment};

/// Everything the hourly cycle persists.
#[derive(Debug, Clone)]
pub enum PersistEvent {
    Observation(NewObservation),
    Assessment(Box<RiskAssessment>),
    LimitCheck {
        checked_at: DateTime<FixedOffset>,
        check: LimitCheck,
    },
    Summary(NewSummary),
}

/// Receives PersistEvents from the monitor and writes them in arrival order.
/// Runs as a dedicated background task so fetch/assess never waits on SQLite.
pub struct DbWriter {
    store: HistoryStore,
    rx: mpsc::Receiver<PersistEvent>,
}

impl DbWriter {
    pub fn new(store: HistoryStore, rx: mpsc::Receiver<PersistEvent>) -> Self {
        Self { store, rx }
    }

    /// Returns once every sender is dropped and the queue is drained.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if let Err(e) = self.write(&event).await {
                error!("DB write error: {e}");
            }
        }
    }

    async fn write(&self, event: &PersistEvent) -> Result<()> {
        match event {
            PersistEvent::Observation(o) => self.store.insert_observation(o).await,
            PersistEvent::Assessment(a) => self.store.insert_assessment(a).await,
            PersistEvent::LimitCheck { checked_at, check } => {
                self.store.insert_limit_check(*checked_at, check).await
            }
            PersistEvent::Summary(s) => self.store.insert_summary(s).await,
        }
    }
}
