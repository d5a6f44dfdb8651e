//! Merchant aggregate: a point of sale belonging to an estate.

mod aggregate;
mod events;
mod schedule;

pub use aggregate::{
    Deposit, DepositSource, Merchant, MerchantAddress, MerchantContact, MerchantDetails,
    MerchantDevice, MerchantOperator, Withdrawal,
};
pub use events::{
    AddressAddedData, ContactAddedData, ContractAddedToMerchantData, DepositMadeData,
    DeviceAddedToMerchantData, MerchantCreatedData, MerchantEvent, MerchantNameUpdatedData,
    MerchantReferenceAllocatedData, OperatorAssignedToMerchantData,
    OperatorRemovedFromMerchantData, SettlementScheduleChangedData, WithdrawalMadeData,
};
pub use schedule::SettlementSchedule;

use common::AggregateId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during merchant commands.
#[derive(Debug, Error)]
pub enum MerchantError {
    #[error("Merchant has not been created")]
    NotCreated,

    #[error("Merchant already created")]
    AlreadyCreated,

    #[error("Merchant name is required")]
    NameRequired,

    #[error("Merchant reference already allocated")]
    ReferenceAlreadyAllocated,

    #[error("Operator {operator_id} is already assigned to the merchant")]
    OperatorAlreadyAssigned { operator_id: AggregateId },

    #[error("Operator {operator_id} is not assigned to the merchant")]
    OperatorNotAssigned { operator_id: AggregateId },

    #[error("Device {0} is already registered to the merchant")]
    DuplicateDevice(String),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("A deposit with the same date, amount and reference already exists")]
    DuplicateDeposit,
}
