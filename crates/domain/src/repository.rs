//! Aggregate loading.

use common::AggregateId;
use event_store::EventStore;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Rebuilds aggregates from their event streams.
///
/// Every load folds the full stream into a fresh default instance; nothing
/// is cached between calls. An empty stream is a successful load of an
/// uncreated aggregate. Envelopes whose type the aggregate does not know
/// are skipped but still advance the version, so a later append carries the
/// right expected version.
#[derive(Debug, Clone)]
pub struct AggregateRepository<S> {
    store: S,
}

impl<S: EventStore> AggregateRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn get_latest_version<A: Aggregate>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<A, DomainError> {
        let envelopes = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in envelopes {
            if A::Event::is_known(&envelope.event_type) {
                let event: A::Event = envelope.decode().map_err(|source| DomainError::CorruptEvent {
                    aggregate_id,
                    version: envelope.version,
                    event_type: envelope.event_type.clone(),
                    source,
                })?;
                aggregate.apply(event);
            } else {
                tracing::trace!(event_type = %envelope.event_type, "skipping unknown event type");
            }
            aggregate.set_version(envelope.version);
        }

        metrics::counter!("aggregate_loads_total", "aggregate_type" => A::aggregate_type())
            .increment(1);
        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it was never created.
    pub async fn get_existing<A: Aggregate>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Option<A>, DomainError> {
        let aggregate: A = self.get_latest_version(aggregate_id).await?;
        Ok(aggregate.is_created().then_some(aggregate))
    }
}
