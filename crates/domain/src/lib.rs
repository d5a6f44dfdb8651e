//! Domain layer for the estate settlement core.
//!
//! This crate provides:
//! - the Aggregate trait and event capability traits
//! - the estate, operator, merchant, contract, voucher, transaction and
//!   settlement aggregates
//! - AggregateRepository and CommandHandler over any event store
//! - the pure fee calculation engine

pub mod aggregate;
pub mod command;
pub mod contract;
pub mod error;
pub mod estate;
pub mod fees;
pub mod merchant;
pub mod operator;
pub mod repository;
pub mod settlement;
pub mod transaction;
pub mod value_objects;
pub mod voucher;

pub use aggregate::{Aggregate, DomainEvent, HasEstateId, HasMerchantId, Lifecycle};
pub use command::{Command, CommandHandler, CommandResult};
pub use contract::{Contract, ContractError, ContractEvent};
pub use error::DomainError;
pub use estate::{Estate, EstateError, EstateEvent};
pub use fees::{
    CalculatedFee, CalculationType, FeeCalculationEngine, FeeType, TransactionFeeToCalculate,
};
pub use merchant::{Merchant, MerchantError, MerchantEvent, SettlementSchedule};
pub use operator::{Operator, OperatorError, OperatorEvent};
pub use repository::AggregateRepository;
pub use settlement::{
    PendingFee, Settlement, SettlementEvent, SettlementStateError, SettlementStatus,
};
pub use transaction::{
    Transaction, TransactionError, TransactionEvent, TransactionService, TransactionType,
};
pub use value_objects::{FeeId, ProductId};
pub use voucher::{Voucher, VoucherError, VoucherEvent};
