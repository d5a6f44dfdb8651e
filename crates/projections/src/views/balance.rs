//! Merchant balance read model: running totals per merchant plus an
//! append-only ledger of every balance change.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::transaction::TransactionHasStartedData;
use domain::{MerchantEvent, SettlementEvent, TransactionEvent, TransactionType};
use event_store::{EventEnvelope, EventId, RecordedEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Applied, Projection, ProjectionPosition};
use crate::store::{MERCHANT_BALANCE_CHANGES, Table, ViewState, WriterConfig, apply_once};

use super::decode_known;

/// Running balance of one merchant.
///
/// `balance` is deposits less withdrawals less authorised sales plus settled
/// merchant fees. `available_balance` further holds back sales that have
/// started but not completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantBalanceProjectionState {
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub merchant_name: Option<String>,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub pending_sales_value: Decimal,
    pub deposit_count: u64,
    pub total_deposited: Decimal,
    pub withdrawal_count: u64,
    pub total_withdrawn: Decimal,
    pub authorised_sale_count: u64,
    pub authorised_sales_value: Decimal,
    pub declined_sale_count: u64,
    pub declined_sales_value: Decimal,
    pub settled_fee_count: u64,
    pub settled_fees_value: Decimal,
    pub last_updated: Option<DateTime<Utc>>,
}

impl MerchantBalanceProjectionState {
    fn new(estate_id: AggregateId, merchant_id: AggregateId) -> Self {
        Self {
            estate_id,
            merchant_id,
            merchant_name: None,
            balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            pending_sales_value: Decimal::ZERO,
            deposit_count: 0,
            total_deposited: Decimal::ZERO,
            withdrawal_count: 0,
            total_withdrawn: Decimal::ZERO,
            authorised_sale_count: 0,
            authorised_sales_value: Decimal::ZERO,
            declined_sale_count: 0,
            declined_sales_value: Decimal::ZERO,
            settled_fee_count: 0,
            settled_fees_value: Decimal::ZERO,
            last_updated: None,
        }
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.available_balance = self.balance - self.pending_sales_value;
        self.last_updated = Some(self.last_updated.map_or(at, |last| last.max(at)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceChangeType {
    Deposit,
    Withdrawal,
    Sale,
    FeeSettled,
}

/// One row of the balance ledger, keyed by the event that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantBalanceChangedEntry {
    pub event_id: EventId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub change_type: BalanceChangeType,
    pub reference: String,
    /// Signed: debits are negative.
    pub amount: Decimal,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct InFlightSale {
    estate_id: AggregateId,
    merchant_id: AggregateId,
    amount: Decimal,
}

#[derive(Debug)]
struct BalanceTables {
    balances: Table<(AggregateId, AggregateId), MerchantBalanceProjectionState>,
    changes: Table<EventId, MerchantBalanceChangedEntry>,
    in_flight: Table<AggregateId, InFlightSale>,
}

impl Default for BalanceTables {
    fn default() -> Self {
        Self {
            balances: Table::new("merchant_balances"),
            changes: Table::new(MERCHANT_BALANCE_CHANGES),
            in_flight: Table::new("merchant_in_flight_sales"),
        }
    }
}

impl BalanceTables {
    fn row(
        &mut self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> &mut MerchantBalanceProjectionState {
        self.balances
            .get_or_insert_with((estate_id, merchant_id), || {
                MerchantBalanceProjectionState::new(estate_id, merchant_id)
            })
    }

    /// Records a ledger row. Returns false if the event already has one.
    fn record_change(
        &mut self,
        event: &EventEnvelope,
        entry: MerchantBalanceChangedEntry,
        config: &WriterConfig,
    ) -> Result<bool> {
        self.changes.insert(event.event_id, entry, config)
    }

    fn apply(&mut self, event: &EventEnvelope, config: &WriterConfig) -> Result<bool> {
        match event.aggregate_type.as_str() {
            "Merchant" => match decode_known(event)? {
                Some(merchant_event) => self.apply_merchant(event, merchant_event, config),
                None => Ok(false),
            },
            "Transaction" => match decode_known(event)? {
                Some(transaction_event) => {
                    self.apply_transaction(event, transaction_event, config)
                }
                None => Ok(false),
            },
            "Settlement" => match decode_known(event)? {
                Some(settlement_event) => self.apply_settlement(event, settlement_event, config),
                None => Ok(false),
            },
            _ => Ok(false),
        }
    }

    fn apply_merchant(
        &mut self,
        event: &EventEnvelope,
        merchant_event: MerchantEvent,
        config: &WriterConfig,
    ) -> Result<bool> {
        match merchant_event {
            MerchantEvent::MerchantCreated(data) => {
                let row = self.row(data.estate_id, data.merchant_id);
                row.merchant_name = Some(data.name);
                row.touch(data.created_at);
            }
            MerchantEvent::MerchantNameUpdated(data) => {
                let row = self.row(data.estate_id, data.merchant_id);
                row.merchant_name = Some(data.name);
                row.touch(event.timestamp);
            }
            MerchantEvent::ManualDepositMade(data) | MerchantEvent::AutomaticDepositMade(data) => {
                let entry = MerchantBalanceChangedEntry {
                    event_id: event.event_id,
                    estate_id: data.estate_id,
                    merchant_id: data.merchant_id,
                    change_type: BalanceChangeType::Deposit,
                    reference: data.reference,
                    amount: data.amount,
                    changed_at: data.deposit_date_time,
                };
                if self.record_change(event, entry, config)? {
                    let row = self.row(data.estate_id, data.merchant_id);
                    row.deposit_count += 1;
                    row.total_deposited += data.amount;
                    row.balance += data.amount;
                    row.touch(data.deposit_date_time);
                }
            }
            MerchantEvent::WithdrawalMade(data) => {
                let entry = MerchantBalanceChangedEntry {
                    event_id: event.event_id,
                    estate_id: data.estate_id,
                    merchant_id: data.merchant_id,
                    change_type: BalanceChangeType::Withdrawal,
                    reference: data.withdrawal_id.to_string(),
                    amount: -data.amount,
                    changed_at: data.withdrawal_date_time,
                };
                if self.record_change(event, entry, config)? {
                    let row = self.row(data.estate_id, data.merchant_id);
                    row.withdrawal_count += 1;
                    row.total_withdrawn += data.amount;
                    row.balance -= data.amount;
                    row.touch(data.withdrawal_date_time);
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn apply_transaction(
        &mut self,
        event: &EventEnvelope,
        transaction_event: TransactionEvent,
        config: &WriterConfig,
    ) -> Result<bool> {
        match transaction_event {
            TransactionEvent::TransactionHasStarted(TransactionHasStartedData {
                transaction_id,
                estate_id,
                merchant_id,
                transaction_type: TransactionType::Sale,
                transaction_date_time,
                amount: Some(amount),
                ..
            }) => {
                self.in_flight.upsert(
                    transaction_id,
                    InFlightSale {
                        estate_id,
                        merchant_id,
                        amount,
                    },
                );
                let row = self.row(estate_id, merchant_id);
                row.pending_sales_value += amount;
                row.touch(transaction_date_time);
                Ok(true)
            }
            TransactionEvent::TransactionHasBeenCompleted(data) => {
                let Some(sale) = self.in_flight.get(&data.transaction_id).cloned() else {
                    return Ok(false);
                };

                let amount = data.amount.unwrap_or(sale.amount);
                let recorded = if data.is_authorised {
                    let entry = MerchantBalanceChangedEntry {
                        event_id: event.event_id,
                        estate_id: sale.estate_id,
                        merchant_id: sale.merchant_id,
                        change_type: BalanceChangeType::Sale,
                        reference: data.transaction_id.to_string(),
                        amount: -amount,
                        changed_at: data.completed_at,
                    };
                    self.record_change(event, entry, config)?
                } else {
                    false
                };

                self.in_flight.remove(&data.transaction_id);
                let row = self.row(sale.estate_id, sale.merchant_id);
                row.pending_sales_value -= sale.amount;
                if data.is_authorised {
                    if recorded {
                        row.authorised_sale_count += 1;
                        row.authorised_sales_value += amount;
                        row.balance -= amount;
                    }
                } else {
                    row.declined_sale_count += 1;
                    row.declined_sales_value += amount;
                }
                row.touch(data.completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn apply_settlement(
        &mut self,
        event: &EventEnvelope,
        settlement_event: SettlementEvent,
        config: &WriterConfig,
    ) -> Result<bool> {
        let SettlementEvent::MerchantFeeSettled(data) = settlement_event else {
            return Ok(false);
        };

        let entry = MerchantBalanceChangedEntry {
            event_id: event.event_id,
            estate_id: data.estate_id,
            merchant_id: data.merchant_id,
            change_type: BalanceChangeType::FeeSettled,
            reference: format!("{}/{}", data.transaction_id, data.fee_id),
            amount: data.calculated_value,
            changed_at: data.settled_date_time,
        };
        if self.record_change(event, entry, config)? {
            let row = self.row(data.estate_id, data.merchant_id);
            row.settled_fee_count += 1;
            row.settled_fees_value += data.calculated_value;
            row.balance += data.calculated_value;
            row.touch(data.settled_date_time);
        }
        Ok(true)
    }
}

/// Balance-affecting projection family.
#[derive(Clone)]
pub struct MerchantBalanceView {
    state: Arc<RwLock<ViewState<BalanceTables>>>,
    config: WriterConfig,
}

impl MerchantBalanceView {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState::default())),
            config,
        }
    }

    pub async fn balance(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Option<MerchantBalanceProjectionState> {
        self.state
            .read()
            .await
            .model
            .balances
            .get(&(estate_id, merchant_id))
            .cloned()
    }

    /// Every merchant balance in an estate.
    pub async fn balances(&self, estate_id: AggregateId) -> Vec<MerchantBalanceProjectionState> {
        self.state
            .read()
            .await
            .model
            .balances
            .filter(|b| b.estate_id == estate_id)
    }

    /// Ledger rows for a merchant whose date falls in `from..=to`, oldest
    /// first.
    pub async fn history(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<MerchantBalanceChangedEntry> {
        let mut entries = self.state.read().await.model.changes.filter(|e| {
            let date = e.changed_at.date_naive();
            e.estate_id == estate_id && e.merchant_id == merchant_id && date >= from && date <= to
        });
        entries.sort_by_key(|e| e.changed_at);
        entries
    }

    pub async fn change_count(&self) -> usize {
        self.state.read().await.model.changes.len()
    }
}

impl Default for MerchantBalanceView {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

#[async_trait]
impl Projection for MerchantBalanceView {
    fn name(&self) -> &'static str {
        "MerchantBalanceView"
    }

    fn aggregate_types(&self) -> &'static [&'static str] {
        &["Merchant", "Transaction", "Settlement"]
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
