//! Settlement read model: one summary per settlement and one row per
//! attributed fee.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::{CalculationType, FeeId, SettlementEvent, SettlementStatus};
use event_store::{EventEnvelope, RecordedEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Applied, Projection, ProjectionPosition};
use crate::store::{MERCHANT_SETTLEMENT_FEES, Table, ViewState, WriterConfig, apply_once};

use super::decode_known;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub settlement_date: NaiveDate,
    pub status: SettlementStatus,
    pub fee_count: u64,
    pub total_fee_value: Decimal,
    pub settled_fee_count: u64,
    pub settled_fee_value: Decimal,
    pub processing_started_date_time: Option<DateTime<Utc>>,
    pub completed_date_time: Option<DateTime<Utc>>,
}

/// A fee line of a settlement, unique per (settlement, transaction, fee).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantSettlementFee {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_id: AggregateId,
    pub fee_id: FeeId,
    pub calculation_type: CalculationType,
    pub fee_value: Decimal,
    pub calculated_value: Decimal,
    pub fee_calculated_date_time: DateTime<Utc>,
    pub is_settled: bool,
    pub settled_date_time: Option<DateTime<Utc>>,
}

type FeeKey = (AggregateId, AggregateId, FeeId);

#[derive(Debug)]
struct SettlementTables {
    summaries: Table<AggregateId, SettlementSummary>,
    fees: Table<FeeKey, MerchantSettlementFee>,
}

impl Default for SettlementTables {
    fn default() -> Self {
        Self {
            summaries: Table::new("settlement_summaries"),
            fees: Table::new(MERCHANT_SETTLEMENT_FEES),
        }
    }
}

impl SettlementTables {
    fn apply(&mut self, event: &EventEnvelope, config: &WriterConfig) -> Result<bool> {
        if event.aggregate_type != "Settlement" {
            return Ok(false);
        }
        let Some(settlement_event) = decode_known::<SettlementEvent>(event)? else {
            return Ok(false);
        };

        match settlement_event {
            SettlementEvent::SettlementCreatedForDate(data) => {
                self.summaries
                    .get_or_insert_with(data.settlement_id, || SettlementSummary {
                        settlement_id: data.settlement_id,
                        estate_id: data.estate_id,
                        merchant_id: data.merchant_id,
                        settlement_date: data.settlement_date,
                        status: SettlementStatus::Pending,
                        fee_count: 0,
                        total_fee_value: Decimal::ZERO,
                        settled_fee_count: 0,
                        settled_fee_value: Decimal::ZERO,
                        processing_started_date_time: None,
                        completed_date_time: None,
                    });
            }
            SettlementEvent::MerchantFeeAddedPendingSettlement(data) => {
                let key = (data.settlement_id, data.transaction_id, data.fee_id);
                let row = MerchantSettlementFee {
                    settlement_id: data.settlement_id,
                    estate_id: data.estate_id,
                    merchant_id: data.merchant_id,
                    transaction_id: data.transaction_id,
                    fee_id: data.fee_id,
                    calculation_type: data.calculation_type,
                    fee_value: data.fee_value,
                    calculated_value: data.calculated_value,
                    fee_calculated_date_time: data.fee_calculated_date_time,
                    is_settled: false,
                    settled_date_time: None,
                };
                if self.fees.insert(key, row, config)?
                    && let Some(summary) = self.summaries.get_mut(&data.settlement_id)
                {
                    summary.fee_count += 1;
                    summary.total_fee_value += data.calculated_value;
                }
            }
            SettlementEvent::SettlementProcessingStarted(data) => {
                if let Some(summary) = self.summaries.get_mut(&data.settlement_id)
                    && summary.status == SettlementStatus::Pending
                {
                    summary.status = SettlementStatus::ProcessingStarted;
                    summary.processing_started_date_time = Some(data.processing_started_date_time);
                }
            }
            SettlementEvent::MerchantFeeSettled(data) => {
                let key = (data.settlement_id, data.transaction_id, data.fee_id);
                if let Some(fee) = self.fees.get_mut(&key)
                    && !fee.is_settled
                {
                    fee.is_settled = true;
                    fee.settled_date_time = Some(data.settled_date_time);
                    if let Some(summary) = self.summaries.get_mut(&data.settlement_id) {
                        summary.settled_fee_count += 1;
                        summary.settled_fee_value += fee.calculated_value;
                    }
                }
            }
            SettlementEvent::SettlementCompleted(data) => {
                if let Some(summary) = self.summaries.get_mut(&data.settlement_id) {
                    summary.status = SettlementStatus::Completed;
                    summary.completed_date_time = Some(data.completed_date_time);
                }
            }
        }
        Ok(true)
    }
}

/// Settlement-affecting projection family.
#[derive(Clone)]
pub struct SettlementView {
    state: Arc<RwLock<ViewState<SettlementTables>>>,
    config: WriterConfig,
}

impl SettlementView {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState::default())),
            config,
        }
    }

    pub async fn settlement(&self, settlement_id: AggregateId) -> Option<SettlementSummary> {
        self.state
            .read()
            .await
            .model
            .summaries
            .get(&settlement_id)
            .cloned()
    }

    /// Settlements of an estate dated in `from..=to`, optionally for one
    /// merchant, oldest first.
    pub async fn settlements(
        &self,
        estate_id: AggregateId,
        merchant_id: Option<AggregateId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<SettlementSummary> {
        let mut summaries = self.state.read().await.model.summaries.filter(|s| {
            s.estate_id == estate_id
                && merchant_id.is_none_or(|m| s.merchant_id == m)
                && s.settlement_date >= from
                && s.settlement_date <= to
        });
        summaries.sort_by_key(|s| (s.settlement_date, s.merchant_id));
        summaries
    }

    /// Fee lines of one settlement in key order.
    pub async fn fees(&self, settlement_id: AggregateId) -> Vec<MerchantSettlementFee> {
        let state = self.state.read().await;
        state
            .model
            .fees
            .range((settlement_id, AggregateId::nil(), FeeId::from_uuid(uuid::Uuid::nil()))..)
            .take_while(|(key, _)| key.0 == settlement_id)
            .map(|(_, fee)| fee.clone())
            .collect()
    }

    pub async fn fee_row_count(&self) -> usize {
        self.state.read().await.model.fees.len()
    }
}

impl Default for SettlementView {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

#[async_trait]
impl Projection for SettlementView {
    fn name(&self) -> &'static str {
        "SettlementView"
    }

    fn aggregate_types(&self) -> &'static [&'static str] {
        &["Settlement"]
    }

    async fn handle(&self, record: &RecordedEvent) -> Result<Applied> {
        let config = &self.config;
        apply_once(&self.state, self.name(), record, config, |tables, event| {
            tables.apply(event, config)
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
