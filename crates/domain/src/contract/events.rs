//! Contract domain events.

use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, HasEstateId};
use crate::fees::{CalculationType, FeeType};
use crate::value_objects::{FeeId, ProductId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ContractEvent {
    ContractCreated(ContractCreatedData),
    FixedValueProductAddedToContract(ProductAddedData),
    /// Same payload as the fixed variant with `value` left empty.
    VariableValueProductAddedToContract(ProductAddedData),
    TransactionFeeAddedToProduct(TransactionFeeAddedToProductData),
    TransactionFeeForProductDisabled(TransactionFeeForProductDisabledData),
}

impl DomainEvent for ContractEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "ContractCreated",
        "FixedValueProductAddedToContract",
        "VariableValueProductAddedToContract",
        "TransactionFeeAddedToProduct",
        "TransactionFeeForProductDisabled",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            ContractEvent::ContractCreated(_) => "ContractCreated",
            ContractEvent::FixedValueProductAddedToContract(_) => {
                "FixedValueProductAddedToContract"
            }
            ContractEvent::VariableValueProductAddedToContract(_) => {
                "VariableValueProductAddedToContract"
            }
            ContractEvent::TransactionFeeAddedToProduct(_) => "TransactionFeeAddedToProduct",
            ContractEvent::TransactionFeeForProductDisabled(_) => {
                "TransactionFeeForProductDisabled"
            }
        }
    }
}

impl HasEstateId for ContractEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(match self {
            ContractEvent::ContractCreated(d) => d.estate_id,
            ContractEvent::FixedValueProductAddedToContract(d)
            | ContractEvent::VariableValueProductAddedToContract(d) => d.estate_id,
            ContractEvent::TransactionFeeAddedToProduct(d) => d.estate_id,
            ContractEvent::TransactionFeeForProductDisabled(d) => d.estate_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCreatedData {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAddedData {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub product_id: ProductId,
    pub product_name: String,
    pub display_text: String,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeeAddedToProductData {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub product_id: ProductId,
    pub fee_id: FeeId,
    pub description: String,
    pub calculation_type: CalculationType,
    pub fee_type: FeeType,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeeForProductDisabledData {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub product_id: ProductId,
    pub fee_id: FeeId,
}
