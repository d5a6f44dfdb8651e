//! Transaction aggregate: one sale, logon or reconciliation at a merchant,
//! with the fees calculated for it.

mod aggregate;
mod commands;
mod events;
mod service;

pub use aggregate::{AppliedFee, Transaction, TransactionCompletion, TransactionDetails};
pub use commands::*;
pub use events::{
    FeeAddedToTransactionData, ProductDetailsAddedData, TransactionEvent,
    TransactionHasBeenCompletedData, TransactionHasStartedData, TransactionType,
};
pub use service::TransactionService;

use thiserror::Error;

/// Errors that can occur during transaction commands.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Transaction has not been started")]
    NotCreated,

    #[error("Transaction already started")]
    AlreadyCreated,

    #[error("Transaction already completed")]
    AlreadyCompleted,

    #[error("Transaction has not been completed")]
    NotCompleted,

    #[error("Transaction was declined; fees only apply to authorised sales")]
    NotAuthorised,

    #[error("Product details already recorded with different values")]
    ProductDetailsMismatch,

    #[error("Transaction has no product details")]
    NoProductDetails,

    #[error("Transaction has no amount")]
    NoAmount,
}
