use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, RecordedEvent, Result, Version,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

/// In-memory event log.
///
/// Events are kept in one vector in append order; the index of an event plus
/// one is its global position. Clones share the same log.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Makes every subsequent call fail with `Unavailable` until switched
    /// back, simulating a lost connection.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EventStoreError::Unavailable(
                "in-memory log switched offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn stream_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    events
        .iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::initial())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        self.ensure_available()?;
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut store = self.events.write().await;
        let current_version = stream_version(&store, aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Unique (stream, version) constraint.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: Version::new(first_new_version.as_i64() - 1),
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        let appended = events.len();
        store.extend(events);

        metrics::counter!("event_store_events_appended_total").increment(appended as u64);
        tracing::debug!(%aggregate_id, version = %last_version, appended, "events appended");

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.ensure_available()?;
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let events = self.get_events_for_aggregate(aggregate_id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.version >= from_version)
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        self.ensure_available()?;
        let store = self.events.read().await;
        let mut events: Vec<_> = store.iter().filter(|e| query.matches(e)).cloned().collect();

        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.version.cmp(&b.version))
        });

        let events = events.into_iter().skip(query.offset.unwrap_or(0));
        Ok(match query.limit {
            Some(limit) => events.take(limit).collect(),
            None => events.collect(),
        })
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.query_events(EventQuery::for_event_type(event_type))
            .await
    }

    async fn read_all_from(&self, position: u64, limit: usize) -> Result<Vec<RecordedEvent>> {
        self.ensure_available()?;
        let store = self.events.read().await;
        Ok(store
            .iter()
            .enumerate()
            .skip(position as usize)
            .take(limit)
            .map(|(index, envelope)| RecordedEvent {
                position: index as u64 + 1,
                envelope: envelope.clone(),
            })
            .collect())
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        self.ensure_available()?;
        let store = self.events.read().await;
        let version = stream_version(&store, aggregate_id);
        Ok((version != Version::initial()).then_some(version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStoreExt;

    fn create_test_event(
        aggregate_id: AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Settlement")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_and_read_stream() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "SettlementCreatedForDate"),
            create_test_event(aggregate_id, Version::new(2), "SettlementProcessingStarted"),
        ];
        let version = store
            .append(events, AppendOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        let stored = store.get_events_for_aggregate(aggregate_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].event_type, "SettlementProcessingStarted");
    }

    #[tokio::test]
    async fn unknown_stream_reads_empty() {
        let store = InMemoryEventStore::new();
        let events = store
            .get_events_for_aggregate(AggregateId::new())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        store
            .append_event(
                create_test_event(aggregate_id, Version::first(), "SettlementCreatedForDate"),
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let result = store
            .append_event(
                create_test_event(aggregate_id, Version::new(2), "SettlementProcessingStarted"),
                AppendOptions::expect_version(Version::initial()),
            )
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::initial());
                assert_eq!(actual, Version::first());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_version_without_check_conflicts() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        store
            .append_event(
                create_test_event(aggregate_id, Version::first(), "A"),
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let result = store
            .append_event(
                create_test_event(aggregate_id, Version::first(), "B"),
                AppendOptions::new(),
            )
            .await;
        assert!(result.unwrap_err().is_concurrency_conflict());
    }

    #[tokio::test]
    async fn read_all_from_pages_global_feed() {
        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();
        store
            .append_event(
                create_test_event(first, Version::first(), "A"),
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append_event(
                create_test_event(second, Version::first(), "B"),
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append_event(
                create_test_event(first, Version::new(2), "C"),
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let page = store.read_all_from(0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].position, 1);
        assert_eq!(page[1].envelope.event_type, "B");

        let rest = store.read_all_from(2, 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].position, 3);
        assert_eq!(rest[0].envelope.event_type, "C");
    }

    #[tokio::test]
    async fn query_filters_and_pages() {
        let store = InMemoryEventStore::new();
        for _ in 0..3 {
            store
                .append_event(
                    create_test_event(AggregateId::new(), Version::first(), "Started"),
                    AppendOptions::new(),
                )
                .await
                .unwrap();
        }

        let all = store.get_events_by_type("Started").await.unwrap();
        assert_eq!(all.len(), 3);

        let paged = store
            .query_events(EventQuery::for_event_type("Started").offset(1).limit(1))
            .await
            .unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[tokio::test]
    async fn offline_log_reports_unavailable() {
        let store = InMemoryEventStore::new();
        store.set_unavailable(true);

        let result = store.get_events_for_aggregate(AggregateId::new()).await;
        assert!(matches!(result, Err(EventStoreError::Unavailable(_))));

        store.set_unavailable(false);
        assert!(store.aggregate_exists(AggregateId::new()).await.is_ok());
    }

    #[tokio::test]
    async fn aggregate_version_tracks_stream() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        assert!(store.get_aggregate_version(id).await.unwrap().is_none());

        store
            .append(
                vec![
                    create_test_event(id, Version::new(1), "A"),
                    create_test_event(id, Version::new(2), "B"),
                ],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_aggregate_version(id).await.unwrap(),
            Some(Version::new(2))
        );
    }

    #[tokio::test]
    async fn read_stream_from_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(
                vec![
                    create_test_event(id, Version::new(1), "A"),
                    create_test_event(id, Version::new(2), "B"),
                    create_test_event(id, Version::new(3), "C"),
                ],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        let tail = store
            .get_events_for_aggregate_from_version(id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].event_type, "B");
    }
}
