//! Append-only, per-stream event log.
//!
//! Each aggregate owns one stream keyed by its [`AggregateId`]. Appends carry
//! an expected version and are rejected with
//! [`EventStoreError::ConcurrencyConflict`] when the stream has moved on.
//! The log also exposes a global, insertion-ordered feed for projection
//! workers.

pub mod error;
pub mod event;
pub mod memory;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, RecordedEvent, Version};
pub use memory::InMemoryEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore, EventStoreExt};
