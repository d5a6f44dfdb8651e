//! Settlement aggregate: one merchant's fees for one settlement date.

mod aggregate;
mod events;
mod state;

pub use aggregate::{PendingFee, Settlement, SettlementDetails, SettlementFee};
pub use events::{
    MerchantFeeAddedPendingSettlementData, MerchantFeeSettledData, SettlementCompletedData,
    SettlementCreatedForDateData, SettlementEvent, SettlementProcessingStartedData,
};
pub use state::SettlementStatus;

use common::AggregateId;
use thiserror::Error;

use crate::value_objects::FeeId;

/// Errors that can occur during settlement commands.
#[derive(Debug, Error)]
pub enum SettlementStateError {
    #[error("Settlement has not been created")]
    NotCreated,

    #[error("Settlement already created")]
    AlreadyCreated,

    #[error("Cannot {action} a settlement in {status} state")]
    InvalidStateTransition {
        status: SettlementStatus,
        action: &'static str,
    },

    #[error("Fee {fee_id} for transaction {transaction_id} is not part of the settlement")]
    FeeNotFound {
        transaction_id: AggregateId,
        fee_id: FeeId,
    },
}
