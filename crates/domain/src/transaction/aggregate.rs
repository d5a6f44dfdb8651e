//! Transaction aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle};
use crate::fees::{CalculatedFee, FeeType};
use crate::value_objects::{FeeId, ProductId};

use super::{
    TransactionError, TransactionEvent, TransactionType,
    events::{
        FeeAddedToTransactionData, ProductDetailsAddedData, TransactionHasBeenCompletedData,
        TransactionHasStartedData,
    },
};

/// Transaction aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    version: Version,
    state: Lifecycle<TransactionDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_type: TransactionType,
    pub transaction_reference: String,
    pub transaction_date_time: DateTime<Utc>,
    pub amount: Option<Decimal>,
    pub contract_id: Option<AggregateId>,
    pub product_id: Option<ProductId>,
    pub completion: Option<TransactionCompletion>,
    /// Fees in the order they were added.
    pub fees: Vec<AppliedFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCompletion {
    pub is_authorised: bool,
    pub response_code: String,
    pub response_message: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFee {
    pub fee: CalculatedFee,
    pub settlement_due_date: Option<NaiveDate>,
}

impl TransactionDetails {
    pub fn transaction_date(&self) -> NaiveDate {
        self.transaction_date_time.date_naive()
    }

    pub fn is_completed(&self) -> bool {
        self.completion.is_some()
    }

    pub fn is_authorised(&self) -> bool {
        self.completion.as_ref().is_some_and(|c| c.is_authorised)
    }

    /// Authorised, completed sale: the only kind that carries fees.
    pub fn is_settleable_sale(&self) -> bool {
        self.transaction_type == TransactionType::Sale && self.is_authorised()
    }

    pub fn merchant_fees(&self) -> impl Iterator<Item = &AppliedFee> {
        self.fees
            .iter()
            .filter(|f| f.fee.fee_type == FeeType::Merchant)
    }

    pub fn has_fee(&self, fee_id: FeeId) -> bool {
        self.fees.iter().any(|f| f.fee.fee_id == fee_id)
    }
}

impl Aggregate for Transaction {
    type Event = TransactionEvent;
    type Error = TransactionError;

    fn aggregate_type() -> &'static str {
        "Transaction"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.transaction_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let TransactionEvent::TransactionHasStarted(data) = event {
            self.state = Lifecycle::Created(TransactionDetails {
                transaction_id: data.transaction_id,
                estate_id: data.estate_id,
                merchant_id: data.merchant_id,
                transaction_type: data.transaction_type,
                transaction_reference: data.transaction_reference,
                transaction_date_time: data.transaction_date_time,
                amount: data.amount,
                contract_id: None,
                product_id: None,
                completion: None,
                fees: Vec::new(),
            });
            return;
        }

        let Some(details) = self.state.get_mut() else {
            return;
        };

        match event {
            TransactionEvent::TransactionHasStarted(_) => {}
            TransactionEvent::ProductDetailsAdded(data) => {
                details.contract_id = Some(data.contract_id);
                details.product_id = Some(data.product_id);
            }
            TransactionEvent::TransactionHasBeenCompleted(data) => {
                if data.amount.is_some() {
                    details.amount = data.amount;
                }
                details.completion = Some(TransactionCompletion {
                    is_authorised: data.is_authorised,
                    response_code: data.response_code,
                    response_message: data.response_message,
                    completed_at: data.completed_at,
                });
            }
            TransactionEvent::MerchantFeeAddedToTransaction(data)
            | TransactionEvent::ServiceProviderFeeAddedToTransaction(data) => {
                if !details.has_fee(data.fee.fee_id) {
                    details.fees.push(AppliedFee {
                        fee: data.fee,
                        settlement_due_date: data.settlement_due_date,
                    });
                }
            }
        }
    }
}

// Query methods
impl Transaction {
    pub fn details(&self) -> Option<&TransactionDetails> {
        self.state.get()
    }

    fn require_created(&self) -> Result<&TransactionDetails, TransactionError> {
        self.details().ok_or(TransactionError::NotCreated)
    }
}

// Command methods (return events)
impl Transaction {
    pub fn start(
        &self,
        data: TransactionHasStartedData,
    ) -> Result<Vec<TransactionEvent>, TransactionError> {
        if self.state.is_created() {
            return Err(TransactionError::AlreadyCreated);
        }
        Ok(vec![TransactionEvent::TransactionHasStarted(data)])
    }

    /// Records the product sold. Repeating the same details is a no-op.
    pub fn add_product_details(
        &self,
        contract_id: AggregateId,
        product_id: ProductId,
    ) -> Result<Vec<TransactionEvent>, TransactionError> {
        let details = self.require_created()?;
        match (details.contract_id, details.product_id) {
            (Some(c), Some(p)) if c == contract_id && p == product_id => return Ok(vec![]),
            (Some(_), _) | (_, Some(_)) => return Err(TransactionError::ProductDetailsMismatch),
            _ => {}
        }
        if details.is_completed() {
            return Err(TransactionError::AlreadyCompleted);
        }

        Ok(vec![TransactionEvent::ProductDetailsAdded(
            ProductDetailsAddedData {
                transaction_id: details.transaction_id,
                estate_id: details.estate_id,
                merchant_id: details.merchant_id,
                contract_id,
                product_id,
            },
        )])
    }

    pub fn complete(
        &self,
        is_authorised: bool,
        response_code: impl Into<String>,
        response_message: impl Into<String>,
        amount: Option<Decimal>,
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<TransactionEvent>, TransactionError> {
        let details = self.require_created()?;
        if details.is_completed() {
            return Err(TransactionError::AlreadyCompleted);
        }

        Ok(vec![TransactionEvent::TransactionHasBeenCompleted(
            TransactionHasBeenCompletedData {
                transaction_id: details.transaction_id,
                estate_id: details.estate_id,
                merchant_id: details.merchant_id,
                is_authorised,
                response_code: response_code.into(),
                response_message: response_message.into(),
                amount,
                completed_at,
            },
        )])
    }

    /// Attaches calculated fees. Fees already on the transaction are skipped,
    /// so replaying a calculation appends nothing.
    pub fn add_fees(
        &self,
        fees: Vec<CalculatedFee>,
        settlement_due_date: NaiveDate,
    ) -> Result<Vec<TransactionEvent>, TransactionError> {
        let details = self.require_created()?;
        if !details.is_completed() {
            return Err(TransactionError::NotCompleted);
        }
        if !details.is_settleable_sale() {
            return Err(TransactionError::NotAuthorised);
        }

        let mut events = Vec::new();
        for fee in fees {
            if details.has_fee(fee.fee_id) {
                continue;
            }
            let event = match fee.fee_type {
                FeeType::Merchant => {
                    TransactionEvent::MerchantFeeAddedToTransaction(FeeAddedToTransactionData {
                        transaction_id: details.transaction_id,
                        estate_id: details.estate_id,
                        merchant_id: details.merchant_id,
                        fee,
                        settlement_due_date: Some(settlement_due_date),
                    })
                }
                FeeType::ServiceProvider => TransactionEvent::ServiceProviderFeeAddedToTransaction(
                    FeeAddedToTransactionData {
                        transaction_id: details.transaction_id,
                        estate_id: details.estate_id,
                        merchant_id: details.merchant_id,
                        fee,
                        settlement_due_date: None,
                    },
                ),
            };
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{CalculationType, FeeCalculationEngine, TransactionFeeToCalculate};
    use rust_decimal_macros::dec;

    fn started_sale() -> Transaction {
        let mut transaction = Transaction::default();
        let events = transaction
            .start(TransactionHasStartedData {
                transaction_id: AggregateId::new(),
                estate_id: AggregateId::new(),
                merchant_id: AggregateId::new(),
                transaction_type: TransactionType::Sale,
                transaction_reference: "0001".to_string(),
                transaction_date_time: Utc::now(),
                amount: Some(dec!(100.00)),
            })
            .unwrap();
        transaction.apply_events(events);
        transaction
    }

    fn calculated(fee_type: FeeType) -> Vec<CalculatedFee> {
        FeeCalculationEngine.calculate_fees(
            &[TransactionFeeToCalculate {
                fee_id: FeeId::new(),
                calculation_type: CalculationType::Percentage,
                fee_type,
                value: dec!(0.5),
            }],
            dec!(100.00),
            None,
        )
    }

    #[test]
    fn fees_require_completion() {
        let transaction = started_sale();
        let result = transaction.add_fees(calculated(FeeType::Merchant), Utc::now().date_naive());
        assert!(matches!(result, Err(TransactionError::NotCompleted)));
    }

    #[test]
    fn declined_sale_takes_no_fees() {
        let mut transaction = started_sale();
        transaction.apply_events(
            transaction
                .complete(false, "1008", "DECLINED", None, Utc::now())
                .unwrap(),
        );
        let result = transaction.add_fees(calculated(FeeType::Merchant), Utc::now().date_naive());
        assert!(matches!(result, Err(TransactionError::NotAuthorised)));
    }

    #[test]
    fn fee_adds_are_idempotent_per_fee_id() {
        let mut transaction = started_sale();
        transaction.apply_events(
            transaction
                .complete(true, "0000", "SUCCESS", None, Utc::now())
                .unwrap(),
        );

        let mut fees = calculated(FeeType::Merchant);
        fees.extend(calculated(FeeType::ServiceProvider));
        let due = Utc::now().date_naive();

        let events = transaction.add_fees(fees.clone(), due).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            TransactionEvent::MerchantFeeAddedToTransaction(_)
        ));
        transaction.apply_events(events);

        assert!(transaction.add_fees(fees, due).unwrap().is_empty());
        let details = transaction.details().unwrap();
        assert_eq!(details.fees.len(), 2);
        assert_eq!(details.merchant_fees().count(), 1);
        assert_eq!(
            details.merchant_fees().next().unwrap().settlement_due_date,
            Some(due)
        );
    }

    #[test]
    fn product_details_repeat_is_noop() {
        let mut transaction = started_sale();
        let contract_id = AggregateId::new();
        let product_id = ProductId::new();
        transaction.apply_events(
            transaction
                .add_product_details(contract_id, product_id)
                .unwrap(),
        );

        assert!(
            transaction
                .add_product_details(contract_id, product_id)
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            transaction.add_product_details(AggregateId::new(), product_id),
            Err(TransactionError::ProductDetailsMismatch)
        ));
    }

    #[test]
    fn completion_amount_overrides_start_amount() {
        let mut transaction = started_sale();
        transaction.apply_events(
            transaction
                .complete(true, "0000", "SUCCESS", Some(dec!(95.00)), Utc::now())
                .unwrap(),
        );
        assert_eq!(transaction.details().unwrap().amount, Some(dec!(95.00)));
    }
}
