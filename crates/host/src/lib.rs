//! Runtime host for the settlement core.
//!
//! Wires configuration, structured logging, the projection workers and the
//! settlement scheduler around one event store, and stops them together when
//! the shared cancellation token fires.

pub mod config;
pub mod scheduler;

use std::sync::Arc;

use event_store::EventStore;
use projections::{ProjectionWorkers, ReadModels, WorkerHandles};
use query::QueryManager;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::{Config, LogFormat};
use scheduler::SettlementScheduler;

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Running background tasks plus the read side they feed.
pub struct Runtime<S> {
    pub read_models: ReadModels,
    pub queries: Arc<QueryManager<S>>,
    cancel: CancellationToken,
    workers: WorkerHandles,
    scheduler: JoinHandle<()>,
}

impl<S> Runtime<S>
where
    S: EventStore + Clone + 'static,
{
    /// Spawns one worker per projection family and the settlement scheduler.
    pub fn start(config: &Config, store: S, cancel: CancellationToken) -> Self {
        let read_models = ReadModels::new(config.writer.clone());

        let mut workers = ProjectionWorkers::new(store.clone(), config.worker_config());
        for family in read_models.families() {
            workers.register(family);
        }
        let workers = workers.spawn(cancel.clone());

        let scheduler = SettlementScheduler::new(store.clone(), config.settlement_interval);
        let scheduler = tokio::spawn(scheduler.run(cancel.clone()));

        tracing::info!(workers = workers.len(), "runtime started");
        Self {
            queries: Arc::new(QueryManager::new(store, read_models.clone())),
            read_models,
            cancel,
            workers,
            scheduler,
        }
    }

    /// Cancels every task and waits for them to stop.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.workers.join().await;
        if let Err(e) = self.scheduler.await {
            tracing::error!(error = %e, "settlement scheduler panicked");
        }
        tracing::info!("runtime stopped");
    }
}
