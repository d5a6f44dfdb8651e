//! Transaction read model: one row per transaction with its outcome and fee
//! totals.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::{FeeId, ProductId, TransactionEvent, TransactionType};
use event_store::{EventEnvelope, RecordedEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Applied, Projection, ProjectionPosition};
use crate::store::{Table, ViewState, WriterConfig, apply_once};

use super::decode_known;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub transaction_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_type: TransactionType,
    pub transaction_reference: String,
    pub transaction_date_time: DateTime<Utc>,
    pub amount: Option<Decimal>,
    pub contract_id: Option<AggregateId>,
    pub product_id: Option<ProductId>,
    pub is_completed: bool,
    pub is_authorised: bool,
    pub response_code: Option<String>,
    pub merchant_fee_value: Decimal,
    pub service_provider_fee_value: Decimal,
    pub fee_ids: Vec<FeeId>,
}

#[derive(Debug)]
struct TransactionTables {
    transactions: Table<AggregateId, TransactionSummary>,
}

impl Default for TransactionTables {
    fn default() -> Self {
        Self {
            transactions: Table::new("transactions"),
        }
    }
}

impl TransactionTables {
    fn apply(&mut self, event: &EventEnvelope) -> Result<bool> {
        if event.aggregate_type != "Transaction" {
            return Ok(false);
        }
        let Some(transaction_event) = decode_known::<TransactionEvent>(event)? else {
            return Ok(false);
        };

        match transaction_event {
            TransactionEvent::TransactionHasStarted(data) => {
                self.transactions
                    .get_or_insert_with(data.transaction_id, || TransactionSummary {
                        transaction_id: data.transaction_id,
                        estate_id: data.estate_id,
                        merchant_id: data.merchant_id,
                        transaction_type: data.transaction_type,
                        transaction_reference: data.transaction_reference.clone(),
                        transaction_date_time: data.transaction_date_time,
                        amount: data.amount,
                        contract_id: None,
                        product_id: None,
                        is_completed: false,
                        is_authorised: false,
                        response_code: None,
                        merchant_fee_value: Decimal::ZERO,
                        service_provider_fee_value: Decimal::ZERO,
                        fee_ids: Vec::new(),
                    });
            }
            TransactionEvent::ProductDetailsAdded(data) => {
                if let Some(row) = self.transactions.get_mut(&data.transaction_id) {
                    row.contract_id = Some(data.contract_id);
                    row.product_id = Some(data.product_id);
                }
            }
            TransactionEvent::TransactionHasBeenCompleted(data) => {
                if let Some(row) = self.transactions.get_mut(&data.transaction_id) {
                    row.is_completed = true;
                    row.is_authorised = data.is_authorised;
                    row.response_code = Some(data.response_code);
                    if data.amount.is_some() {
                        row.amount = data.amount;
                    }
                }
            }
            TransactionEvent::MerchantFeeAddedToTransaction(data) => {
                if let Some(row) = self.transactions.get_mut(&data.transaction_id)
                    && !row.fee_ids.contains(&data.fee.fee_id)
                {
                    row.fee_ids.push(data.fee.fee_id);
                    row.merchant_fee_value += data.fee.calculated_value;
                }
            }
            TransactionEvent::ServiceProviderFeeAddedToTransaction(data) => {
                if let Some(row) = self.transactions.get_mut(&data.transaction_id)
                    && !row.fee_ids.contains(&data.fee.fee_id)
                {
                    row.fee_ids.push(data.fee.fee_id);
                    row.service_provider_fee_value += data.fee.calculated_value;
                }
            }
        }
        Ok(true)
    }
}

/// Transaction-affecting projection family.
#[derive(Clone)]
pub struct TransactionView {
    state: Arc<RwLock<ViewState<TransactionTables>>>,
    config: WriterConfig,
}

impl TransactionView {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState::default())),
            config,
        }
    }

    pub async fn transaction(&self, transaction_id: AggregateId) -> Option<TransactionSummary> {
        self.state
            .read()
            .await
            .model
            .transactions
            .get(&transaction_id)
            .cloned()
    }

    /// A merchant's transactions dated in `from..=to`, oldest first.
    pub async fn transactions(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<TransactionSummary> {
        let mut rows = self.state.read().await.model.transactions.filter(|t| {
            let date = t.transaction_date_time.date_naive();
            t.estate_id == estate_id && t.merchant_id == merchant_id && date >= from && date <= to
        });
        rows.sort_by_key(|t| t.transaction_date_time);
        rows
    }
}

impl Default for TransactionView {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

#[async_trait]
impl Projection for TransactionView {
    fn name(&self) -> &'static str {
        "TransactionView"
    }

    fn aggregate_types(&self) -> &'static [&'static str] {
        &["Transaction"]
    }

    async fn handle(&self, record: &RecordedEvent) -> Result<Applied> {
        apply_once(&self.state, self.name(), record, &self.config, |tables, event| {
            tables.apply(event)
        })
        .await
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        self.state.write().await.reset();
        Ok(())
    }
}
