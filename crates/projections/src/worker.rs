//! Background projection workers.
//!
//! One tokio task per projection family. Each task tails the global feed from
//! its projection's checkpoint, sleeps when it reaches the head, and stops
//! when the shared [`CancellationToken`] fires.

use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::processor::{DEFAULT_BATCH_SIZE, deliver_batch};
use crate::projection::Projection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Idle time between polls once a worker has reached the head of the log.
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// The set of projection families to run in the background.
pub struct ProjectionWorkers<S> {
    store: S,
    config: WorkerConfig,
    projections: Vec<Arc<dyn Projection>>,
}

impl<S> ProjectionWorkers<S>
where
    S: EventStore + Clone + 'static,
{
    pub fn new(store: S, config: WorkerConfig) -> Self {
        Self {
            store,
            config,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }

    /// Starts one task per registered projection.
    pub fn spawn(self, cancel: CancellationToken) -> WorkerHandles {
        let handles = self
            .projections
            .into_iter()
            .map(|projection| {
                let name = projection.name();
                let handle = tokio::spawn(run_worker(
                    self.store.clone(),
                    projection,
                    self.config,
                    cancel.clone(),
                ));
                (name, handle)
            })
            .collect();
        WorkerHandles { handles }
    }
}

/// Join handles for running workers.
pub struct WorkerHandles {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl WorkerHandles {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Waits for every worker to stop.
    pub async fn join(self) {
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(projection = name, error = %e, "projection worker panicked");
            }
        }
    }
}

async fn run_worker<S: EventStore>(
    store: S,
    projection: Arc<dyn Projection>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    let name = projection.name();
    let batch_size = config.batch_size.max(1);
    let mut cursor = projection.position().await.checkpoint;
    tracing::info!(projection = name, cursor, "projection worker started");

    while !cancel.is_cancelled() {
        let at_head = match deliver_batch(&store, projection.as_ref(), &mut cursor, batch_size).await
        {
            Ok(outcome) => {
                if outcome.read > 0 {
                    tracing::debug!(
                        projection = name,
                        read = outcome.read,
                        applied = outcome.applied,
                        duplicates = outcome.duplicates,
                        cursor,
                        "projection batch delivered"
                    );
                }
                outcome.read < batch_size
            }
            Err(e) => {
                metrics::counter!("projections_batch_failures", "projection" => name)
                    .increment(1);
                tracing::warn!(projection = name, cursor, error = %e, "projection batch failed");
                true
            }
        };

        if at_head {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.poll_interval) => {}
            }
        }
    }

    let position = projection.position().await;
    tracing::info!(
        projection = name,
        position = %position,
        "projection worker stopped"
    );
}
