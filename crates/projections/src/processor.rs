//! Feeds the global event log to projections.

use std::sync::Arc;

use event_store::{EventStore, RecordedEvent};

use crate::Result;
use crate::projection::{Applied, Projection};

/// Default number of events read from the log per page.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// What one page of the feed did to a projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Events read from the log.
    pub read: usize,
    /// Events that changed the read model.
    pub applied: usize,
    /// Events skipped through the processed-events ledger.
    pub duplicates: usize,
}

impl BatchOutcome {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Applied => self.applied += 1,
            Applied::Duplicate => self.duplicates += 1,
            Applied::Ignored => {}
        }
    }
}

/// Reads one page after `cursor` and delivers it to `projection`.
///
/// `cursor` moves past each event once the projection has accepted it, so a
/// failure part-way leaves it on the last event that went through and the
/// failed event is read again on the next call.
pub async fn deliver_batch<S: EventStore + ?Sized>(
    store: &S,
    projection: &dyn Projection,
    cursor: &mut u64,
    batch_size: usize,
) -> Result<BatchOutcome> {
    let page = store.read_all_from(*cursor, batch_size).await?;
    let mut outcome = BatchOutcome {
        read: page.len(),
        ..BatchOutcome::default()
    };

    for record in &page {
        if projection.interested_in(&record.envelope) {
            outcome.record(projection.handle(record).await?);
        }
        *cursor = record.position;
    }
    Ok(outcome)
}

/// Delivers every event after the projection's checkpoint, page by page.
pub async fn catch_up<S: EventStore + ?Sized>(
    store: &S,
    projection: &dyn Projection,
    batch_size: usize,
) -> Result<BatchOutcome> {
    let mut cursor = projection.position().await.checkpoint;
    let mut total = BatchOutcome::default();

    loop {
        let page = deliver_batch(store, projection, &mut cursor, batch_size).await?;
        total.read += page.read;
        total.applied += page.applied;
        total.duplicates += page.duplicates;
        if page.read < batch_size {
            break;
        }
    }
    Ok(total)
}

/// Delivers events from an event store to a set of projections.
///
/// Supports catch-up from each projection's own checkpoint, single event
/// delivery and a full rebuild.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Arc<dyn Projection>>,
    batch_size: usize,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(Arc::from(projection));
    }

    /// Registers a projection that is also held elsewhere, e.g. by workers.
    pub fn register_shared(&mut self, projection: Arc<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the head of the log. Returns the number
    /// of events applied across all projections.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<usize> {
        let mut applied = 0;
        for projection in &self.projections {
            let outcome = catch_up(&self.store, projection.as_ref(), self.batch_size).await?;
            tracing::debug!(
                projection = projection.name(),
                read = outcome.read,
                applied = outcome.applied,
                duplicates = outcome.duplicates,
                "projection caught up"
            );
            applied += outcome.applied;
        }

        tracing::info!(events_applied = applied, "catch-up complete");
        Ok(applied)
    }

    /// Delivers a single event to every interested projection.
    #[tracing::instrument(skip(self, record), fields(event_type = %record.envelope.event_type))]
    pub async fn process_event(&self, record: &RecordedEvent) -> Result<()> {
        for projection in &self.projections {
            if projection.interested_in(&record.envelope) {
                projection.handle(record).await?;
            }
        }
        Ok(())
    }

    /// Resets all projections and replays the log from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<usize> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Counts the events it is handed.
    struct CountingProjection {
        count: Arc<RwLock<u64>>,
        position: Arc<RwLock<ProjectionPosition>>,
    }

    impl CountingProjection {
        fn new() -> Self {
            Self {
                count: Arc::new(RwLock::new(0)),
                position: Arc::new(RwLock::new(ProjectionPosition::zero())),
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        fn aggregate_types(&self) -> &'static [&'static str] {
            &["Merchant"]
        }

        async fn handle(&self, record: &RecordedEvent) -> Result<Applied> {
            *self.count.write().await += 1;
            let mut pos = self.position.write().await;
            *pos = pos.advance(record.position, true);
            Ok(Applied::Applied)
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            *self.count.write().await = 0;
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn test_event(aggregate_id: AggregateId, aggregate_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(aggregate_type)
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    async fn store_with(count: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let events = (1..=count).map(|v| test_event(id, "Merchant", v)).collect();
        store.append(events, AppendOptions::new()).await.unwrap();
        store
    }

    #[tokio::test]
    async fn catch_up_delivers_every_event() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store_with(3).await);
        processor.register(Box::new(projection));

        assert_eq!(processor.run_catch_up().await.unwrap(), 3);
        assert_eq!(*count.read().await, 3);
    }

    #[tokio::test]
    async fn catch_up_pages_through_the_log() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store_with(7).await).with_batch_size(2);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        assert_eq!(*count.read().await, 7);
    }

    #[tokio::test]
    async fn second_catch_up_starts_from_the_checkpoint() {
        let store = store_with(3).await;
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(store.clone());
        processor.register(Box::new(projection));
        processor.run_catch_up().await.unwrap();

        let id = AggregateId::new();
        store
            .append(vec![test_event(id, "Merchant", 1)], AppendOptions::new())
            .await
            .unwrap();
        processor.run_catch_up().await.unwrap();

        assert_eq!(*count.read().await, 4);
    }

    #[tokio::test]
    async fn other_families_are_not_delivered() {
        let store = InMemoryEventStore::new();
        store
            .append(
                vec![test_event(AggregateId::new(), "Voucher", 1)],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let mut cursor = 0;
        let outcome = deliver_batch(&store, &projection, &mut cursor, 10)
            .await
            .unwrap();

        assert_eq!(outcome.read, 1);
        assert_eq!(outcome.applied, 0);
        assert_eq!(cursor, 1);
        assert_eq!(*count.read().await, 0);
    }

    #[tokio::test]
    async fn process_single_event() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(projection));

        let record = RecordedEvent {
            position: 1,
            envelope: test_event(AggregateId::new(), "Merchant", 1),
        };
        processor.process_event(&record).await.unwrap();

        assert_eq!(*count.read().await, 1);
    }

    #[tokio::test]
    async fn rebuild_resets_and_replays() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let position = Arc::clone(&projection.position);

        let mut processor = ProjectionProcessor::new(store_with(2).await);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.rebuild_all().await.unwrap();

        assert_eq!(*count.read().await, 2);
        assert_eq!(position.read().await.events_applied, 2);
    }

    #[tokio::test]
    async fn empty_store_catch_up() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);

        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(projection));

        assert_eq!(processor.run_catch_up().await.unwrap(), 0);
        assert_eq!(*count.read().await, 0);
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_an_error() {
        let store = store_with(1).await;
        store.set_unavailable(true);

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(CountingProjection::new()));

        assert!(processor.run_catch_up().await.is_err());
    }
}
