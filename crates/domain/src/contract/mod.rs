//! Contract aggregate: the products an operator offers under an estate and
//! the fee schedule attached to each product.

mod aggregate;
mod events;

pub use aggregate::{Contract, ContractDetails, ContractProduct, ProductFee};
pub use events::{
    ContractCreatedData, ContractEvent, ProductAddedData, TransactionFeeAddedToProductData,
    TransactionFeeForProductDisabledData,
};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::value_objects::{FeeId, ProductId};

/// Errors that can occur during contract commands.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Contract has not been created")]
    NotCreated,

    #[error("Contract already created")]
    AlreadyCreated,

    #[error("Contract description is required")]
    DescriptionRequired,

    #[error("Product '{0}' already exists on the contract")]
    DuplicateProduct(String),

    #[error("Product {product_id} not found on the contract")]
    ProductNotFound { product_id: ProductId },

    #[error("Fee {fee_id} not found on product {product_id}")]
    FeeNotFound { product_id: ProductId, fee_id: FeeId },

    #[error("Fee value must be positive, got {0}")]
    InvalidFeeValue(Decimal),
}
