//! Query error types.

use domain::DomainError;
use thiserror::Error;

/// Why a query produced no value.
///
/// The three causes stay distinct so a caller can tell "retry later" apart
/// from "there is nothing there".
#[derive(Debug, Error)]
pub enum QueryError {
    /// No created entity has this identifier.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A list the caller requires to be non-empty came back empty.
    #[error("No {what} found for {scope}")]
    NoneFound { what: &'static str, scope: String },

    /// The event log could not be read, or held an undecodable event.
    #[error("Query failed: {0}")]
    Failure(#[source] DomainError),
}

impl QueryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        QueryError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn none_found(what: &'static str, scope: impl ToString) -> Self {
        QueryError::NoneFound {
            what,
            scope: scope.to_string(),
        }
    }

    /// HTTP-equivalent status for callers that translate to a transport.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::NotFound { .. } | QueryError::NoneFound { .. } => 404,
            QueryError::Failure(e) if e.is_unavailable() => 503,
            QueryError::Failure(_) => 500,
        }
    }

    /// Returns true if repeating the query may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::Failure(e) if e.is_unavailable())
    }
}

impl From<DomainError> for QueryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::AggregateNotFound {
                aggregate_type,
                aggregate_id,
            } => QueryError::not_found(aggregate_type, aggregate_id),
            other => QueryError::Failure(other),
        }
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use event_store::EventStoreError;

    #[test]
    fn not_found_and_none_found_map_to_404() {
        assert_eq!(QueryError::not_found("Estate", AggregateId::new()).status_code(), 404);
        assert_eq!(QueryError::none_found("merchants", "estate").status_code(), 404);
    }

    #[test]
    fn unavailable_store_maps_to_503_and_is_retryable() {
        let err = QueryError::from(DomainError::EventStore(EventStoreError::Unavailable(
            "down".to_string(),
        )));
        assert_eq!(err.status_code(), 503);
        assert!(err.is_retryable());
    }

    #[test]
    fn aggregate_not_found_becomes_not_found() {
        let id = AggregateId::new();
        let err = QueryError::from(DomainError::AggregateNotFound {
            aggregate_type: "Contract",
            aggregate_id: id,
        });
        assert!(matches!(err, QueryError::NotFound { entity: "Contract", .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn corrupt_data_is_a_failure_but_not_retryable() {
        let source = serde_json::from_str::<u32>("x").unwrap_err();
        let err = QueryError::from(DomainError::Serialization(source));
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retryable());
    }
}
