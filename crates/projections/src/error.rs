//! Projection error types.

use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Failed to deserialize an event payload.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A keyed insert hit an existing row in a table that does not ignore
    /// duplicates.
    #[error("Duplicate key {key} in table {table}")]
    DuplicateKey { table: &'static str, key: String },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
