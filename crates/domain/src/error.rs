//! Domain error types.

use common::AggregateId;
use event_store::{EventStoreError, Version};
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::contract::ContractError;
use crate::estate::EstateError;
use crate::merchant::MerchantError;
use crate::operator::OperatorError;
use crate::settlement::SettlementStateError;
use crate::transaction::TransactionError;
use crate::voucher::VoucherError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Estate error: {0}")]
    Estate(#[from] EstateError),

    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),

    #[error("Merchant error: {0}")]
    Merchant(#[from] MerchantError),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),

    #[error("Voucher error: {0}")]
    Voucher(#[from] VoucherError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementStateError),

    /// The stream holds no creation event for the aggregate.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// A stored event of a known type could not be decoded.
    #[error("Corrupt {event_type} event at version {version} of {aggregate_id}: {source}")]
    CorruptEvent {
        aggregate_id: AggregateId,
        version: Version,
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found<A: Aggregate>(aggregate_id: AggregateId) -> Self {
        DomainError::AggregateNotFound {
            aggregate_type: A::aggregate_type(),
            aggregate_id,
        }
    }

    /// Returns true if an append lost an optimistic concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_concurrency_conflict())
    }

    /// Returns true if the event log could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DomainError::EventStore(EventStoreError::Unavailable(_)))
    }
}
