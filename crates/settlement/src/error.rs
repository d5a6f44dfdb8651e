use common::AggregateId;
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur while reconciling or driving a settlement.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// No settlement stream exists for the id.
    #[error("Settlement {0} not found")]
    NotFound(AggregateId),

    /// The caller cancelled before anything was appended.
    #[error("Settlement run cancelled")]
    Cancelled,
}

impl SettlementError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, SettlementError::Domain(e) if e.is_concurrency_conflict())
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
