//! Transaction commands.

use chrono::{DateTime, Utc};
use common::AggregateId;
use rust_decimal::Decimal;

use crate::command::Command;
use crate::value_objects::ProductId;

use super::{Transaction, TransactionType};

/// Command to start a transaction at a merchant.
#[derive(Debug, Clone)]
pub struct StartTransaction {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_type: TransactionType,
    pub transaction_reference: String,
    pub transaction_date_time: DateTime<Utc>,
    pub amount: Option<Decimal>,
}

impl StartTransaction {
    /// A sale with a generated transaction id.
    pub fn sale(
        estate_id: AggregateId,
        merchant_id: AggregateId,
        transaction_date_time: DateTime<Utc>,
        amount: Decimal,
    ) -> Self {
        let transaction_id = AggregateId::new();
        Self {
            transaction_id,
            estate_id,
            merchant_id,
            transaction_type: TransactionType::Sale,
            transaction_reference: transaction_id.to_string(),
            transaction_date_time,
            amount: Some(amount),
        }
    }
}

impl Command for StartTransaction {
    type Aggregate = Transaction;

    fn aggregate_id(&self) -> AggregateId {
        self.transaction_id
    }
}

/// Command to record which contract product was sold.
#[derive(Debug, Clone)]
pub struct AddProductDetails {
    pub transaction_id: AggregateId,
    pub contract_id: AggregateId,
    pub product_id: ProductId,
}

impl AddProductDetails {
    pub fn new(transaction_id: AggregateId, contract_id: AggregateId, product_id: ProductId) -> Self {
        Self {
            transaction_id,
            contract_id,
            product_id,
        }
    }
}

impl Command for AddProductDetails {
    type Aggregate = Transaction;

    fn aggregate_id(&self) -> AggregateId {
        self.transaction_id
    }
}

/// Command to complete a transaction with the operator's response.
#[derive(Debug, Clone)]
pub struct CompleteTransaction {
    pub transaction_id: AggregateId,
    pub is_authorised: bool,
    pub response_code: String,
    pub response_message: String,
    /// Final amount, when it differs from the started amount.
    pub amount: Option<Decimal>,
}

impl CompleteTransaction {
    pub fn authorised(transaction_id: AggregateId) -> Self {
        Self {
            transaction_id,
            is_authorised: true,
            response_code: "0000".to_string(),
            response_message: "SUCCESS".to_string(),
            amount: None,
        }
    }

    pub fn declined(transaction_id: AggregateId, response_code: impl Into<String>) -> Self {
        Self {
            transaction_id,
            is_authorised: false,
            response_code: response_code.into(),
            response_message: "DECLINED".to_string(),
            amount: None,
        }
    }
}

impl Command for CompleteTransaction {
    type Aggregate = Transaction;

    fn aggregate_id(&self) -> AggregateId {
        self.transaction_id
    }
}
