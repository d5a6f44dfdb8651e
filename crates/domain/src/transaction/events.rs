//! Transaction domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, HasEstateId, HasMerchantId};
use crate::fees::CalculatedFee;
use crate::value_objects::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Logon,
    Sale,
    Reconciliation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TransactionEvent {
    TransactionHasStarted(TransactionHasStartedData),
    ProductDetailsAdded(ProductDetailsAddedData),
    TransactionHasBeenCompleted(TransactionHasBeenCompletedData),
    MerchantFeeAddedToTransaction(FeeAddedToTransactionData),
    ServiceProviderFeeAddedToTransaction(FeeAddedToTransactionData),
}

impl DomainEvent for TransactionEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "TransactionHasStarted",
        "ProductDetailsAdded",
        "TransactionHasBeenCompleted",
        "MerchantFeeAddedToTransaction",
        "ServiceProviderFeeAddedToTransaction",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            TransactionEvent::TransactionHasStarted(_) => "TransactionHasStarted",
            TransactionEvent::ProductDetailsAdded(_) => "ProductDetailsAdded",
            TransactionEvent::TransactionHasBeenCompleted(_) => "TransactionHasBeenCompleted",
            TransactionEvent::MerchantFeeAddedToTransaction(_) => "MerchantFeeAddedToTransaction",
            TransactionEvent::ServiceProviderFeeAddedToTransaction(_) => {
                "ServiceProviderFeeAddedToTransaction"
            }
        }
    }
}

impl TransactionEvent {
    fn ids(&self) -> (AggregateId, AggregateId) {
        match self {
            TransactionEvent::TransactionHasStarted(d) => (d.estate_id, d.merchant_id),
            TransactionEvent::ProductDetailsAdded(d) => (d.estate_id, d.merchant_id),
            TransactionEvent::TransactionHasBeenCompleted(d) => (d.estate_id, d.merchant_id),
            TransactionEvent::MerchantFeeAddedToTransaction(d)
            | TransactionEvent::ServiceProviderFeeAddedToTransaction(d) => {
                (d.estate_id, d.merchant_id)
            }
        }
    }
}

impl HasEstateId for TransactionEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(self.ids().0)
    }
}

impl HasMerchantId for TransactionEvent {
    fn merchant_id(&self) -> Option<AggregateId> {
        Some(self.ids().1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHasStartedData {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_type: TransactionType,
    pub transaction_reference: String,
    pub transaction_date_time: DateTime<Utc>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetailsAddedData {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub contract_id: AggregateId,
    pub product_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionHasBeenCompletedData {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub is_authorised: bool,
    pub response_code: String,
    pub response_message: String,
    pub amount: Option<Decimal>,
    pub completed_at: DateTime<Utc>,
}

/// Shared by merchant and service provider fees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeAddedToTransactionData {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub fee: CalculatedFee,
    /// Set on merchant fees only.
    pub settlement_due_date: Option<NaiveDate>,
}
