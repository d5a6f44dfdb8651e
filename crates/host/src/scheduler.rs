//! Periodic settlement processing.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use event_store::EventStore;
use settlement::{SettlementEngine, SettlementRun};
use tokio_util::sync::CancellationToken;

/// Runs every due settlement on a fixed interval.
pub struct SettlementScheduler<S: EventStore> {
    engine: SettlementEngine<S>,
    interval: Duration,
}

impl<S: EventStore + Clone> SettlementScheduler<S> {
    pub fn new(store: S, interval: Duration) -> Self {
        Self {
            engine: SettlementEngine::new(store),
            interval,
        }
    }

    /// Processes the settlements dated before `today`. Failures are
    /// logged; the next tick tries again.
    pub async fn tick(&self, today: NaiveDate, cancel: &CancellationToken) -> Vec<SettlementRun> {
        metrics::counter!("settlement_scheduler_ticks_total").increment(1);
        match self.engine.run_due(today, cancel).await {
            Ok(runs) => {
                let completed = runs.iter().filter(|r| r.completed).count();
                if !runs.is_empty() {
                    tracing::info!(%today, runs = runs.len(), completed, "settlement tick");
                }
                runs
            }
            Err(e) => {
                tracing::warn!(%today, error = %e, "settlement tick failed");
                Vec::new()
            }
        }
    }

    /// Ticks immediately and then every interval until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs_f64(), "settlement scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(Utc::now().date_naive(), &cancel).await;
                }
            }
        }
        tracing::info!("settlement scheduler stopped");
    }
}
