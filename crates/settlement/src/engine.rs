//! Settlement reconciliation and lifecycle.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use common::AggregateId;
use domain::transaction::TransactionDetails;
use domain::{
    Aggregate, AggregateRepository, CalculatedFee, CommandHandler, Contract, DomainError,
    FeeCalculationEngine, FeeId, FeeType, HasEstateId, HasMerchantId, Merchant, PendingFee,
    Settlement, SettlementEvent, SettlementSchedule, SettlementStateError, Transaction,
    TransactionEvent,
};
use event_store::{EventQuery, EventStore};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SettlementError};
use crate::report::{
    AttributionFailure, DueSettlement, ProcessingOutcome, SettlementReport, SettlementRun,
};

/// Drives settlements through Pending, ProcessingStarted and Completed.
///
/// Every state change is an append to the settlement's own stream with the
/// version read at load time, so two engines racing on the same merchant
/// and date serialize on that stream.
pub struct SettlementEngine<S: EventStore> {
    repository: AggregateRepository<S>,
    settlements: CommandHandler<S, Settlement>,
    fees: FeeCalculationEngine,
}

impl<S: EventStore + Clone> SettlementEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            repository: AggregateRepository::new(store.clone()),
            settlements: CommandHandler::new(store),
            fees: FeeCalculationEngine::new(),
        }
    }

    /// Attributes the merchant fees of every authorised sale due on
    /// `settlement_date` to the settlement for that date.
    ///
    /// Fees already carried on a transaction are reused; otherwise they are
    /// calculated from the contract. Lines that cannot be attributed are
    /// reported and do not stop the run. Nothing is appended when the token
    /// is cancelled before the final append.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn reconcile(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        settlement_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SettlementReport> {
        let settlement_id = Settlement::id_for(estate_id, merchant_id, settlement_date);
        let mut report = SettlementReport::new(settlement_id, settlement_date);

        let merchant: Merchant = self.repository.get_latest_version(merchant_id).await?;
        let schedule = merchant.settlement_schedule();

        let mut pending = Vec::new();
        let mut contracts = HashMap::new();
        for transaction_id in self.merchant_transactions(estate_id, merchant_id).await? {
            if cancel.is_cancelled() {
                return Err(SettlementError::Cancelled);
            }

            let transaction: Transaction =
                self.repository.get_latest_version(transaction_id).await?;
            let Some(details) = transaction.details() else {
                continue;
            };
            if !details.is_settleable_sale() || due_date(details, schedule) != settlement_date {
                continue;
            }

            let fees = self
                .pending_fees_for(details, &mut contracts, &mut report.failures)
                .await?;
            pending.extend(fees);
        }

        if cancel.is_cancelled() {
            return Err(SettlementError::Cancelled);
        }

        let settlement: Settlement = self.repository.get_latest_version(settlement_id).await?;
        if pending.is_empty() && !settlement.is_created() {
            tracing::debug!(%settlement_id, "nothing to settle");
            self.record_failures(&report);
            return Ok(report);
        }

        if !settlement.is_created() {
            self.settlements
                .execute_with_retry(settlement_id, |s| {
                    if s.is_created() {
                        Ok(vec![])
                    } else {
                        s.create(estate_id, merchant_id, settlement_date)
                    }
                })
                .await?;
        }
        report.settlement_exists = true;

        let result = self
            .settlements
            .execute_with_retry(settlement_id, |s| {
                if s.is_completed() {
                    Ok(vec![])
                } else {
                    s.add_fees(&pending)
                }
            })
            .await?;

        let unique: BTreeSet<(AggregateId, FeeId)> = pending
            .iter()
            .map(|f| (f.transaction_id, f.fee_id))
            .collect();
        if let Some(details) = result.aggregate.details()
            && result.aggregate.is_completed()
        {
            let late: BTreeSet<AggregateId> = unique
                .iter()
                .filter(|(tx, fee)| !details.has_fee(*tx, *fee))
                .map(|(tx, _)| *tx)
                .collect();
            report.fees_already_present = unique
                .iter()
                .filter(|(tx, fee)| details.has_fee(*tx, *fee))
                .count();
            report.late_transactions = late.into_iter().collect();
            if !report.late_transactions.is_empty() {
                tracing::warn!(
                    %settlement_id,
                    late = report.late_transactions.len(),
                    "transactions arrived after settlement completed"
                );
            }
        } else {
            report.fees_added = result.events.len();
            report.fees_already_present = unique.len() - report.fees_added;
        }

        metrics::counter!("settlement_fees_added_total").increment(report.fees_added as u64);
        self.record_failures(&report);
        tracing::info!(
            %settlement_id,
            fees_added = report.fees_added,
            fees_already_present = report.fees_already_present,
            failures = report.failures.len(),
            "settlement reconciled"
        );

        Ok(report)
    }

    /// Moves a settlement from Pending to ProcessingStarted.
    ///
    /// A settlement that has already started (or completed) is left alone
    /// and reported as [`ProcessingOutcome::AlreadyStarted`]. Losing a race
    /// to another caller ends the same way after one reload.
    #[tracing::instrument(skip(self))]
    pub async fn start_processing(&self, settlement_id: AggregateId) -> Result<ProcessingOutcome> {
        let result = self
            .settlements
            .execute_with_retry(settlement_id, |s| s.start_processing(Utc::now()))
            .await
            .map_err(|e| not_found_or(settlement_id, e))?;

        if result.events.is_empty() {
            tracing::debug!(%settlement_id, "processing already started");
            return Ok(ProcessingOutcome::AlreadyStarted);
        }

        metrics::counter!("settlement_processing_started_total").increment(1);
        tracing::info!(%settlement_id, "settlement processing started");
        Ok(ProcessingOutcome::Started)
    }

    /// Completes a started settlement. Returns false if it was already
    /// completed.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, settlement_id: AggregateId) -> Result<bool> {
        let result = self
            .settlements
            .execute_with_retry(settlement_id, |s| s.complete(Utc::now()))
            .await
            .map_err(|e| not_found_or(settlement_id, e))?;

        let completed = !result.events.is_empty();
        if completed {
            tracing::info!(%settlement_id, "settlement completed");
        }
        Ok(completed)
    }

    /// Records the payout of one fee line. Returns false if it was already
    /// settled.
    #[tracing::instrument(skip(self))]
    pub async fn settle_fee(
        &self,
        settlement_id: AggregateId,
        transaction_id: AggregateId,
        fee_id: FeeId,
    ) -> Result<bool> {
        let result = self
            .settlements
            .execute_with_retry(settlement_id, |s| {
                s.settle_fee(transaction_id, fee_id, Utc::now())
            })
            .await
            .map_err(|e| not_found_or(settlement_id, e))?;

        Ok(!result.events.is_empty())
    }

    /// Records the payout of every unsettled line. Returns how many lines
    /// were settled by this call.
    #[tracing::instrument(skip(self))]
    pub async fn settle_all_pending(&self, settlement_id: AggregateId) -> Result<usize> {
        let result = self
            .settlements
            .execute_with_retry(settlement_id, |s| s.settle_all_pending(Utc::now()))
            .await
            .map_err(|e| not_found_or(settlement_id, e))?;

        Ok(result.events.len())
    }

    /// Reconciles the settlement for a merchant and date, then starts it, pays
    /// out every pending line and completes it.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn process_settlement(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        settlement_date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<SettlementRun> {
        let started = Instant::now();
        let report = self
            .reconcile(estate_id, merchant_id, settlement_date, cancel)
            .await?;

        if !report.settlement_exists {
            return Ok(SettlementRun {
                report,
                processing: None,
                fees_settled: 0,
                completed: false,
            });
        }
        if cancel.is_cancelled() {
            return Err(SettlementError::Cancelled);
        }

        let processing = self.start_processing(report.settlement_id).await?;
        let fees_settled = self.settle_all_pending(report.settlement_id).await?;
        self.complete(report.settlement_id).await?;

        metrics::histogram!("settlement_duration_seconds").record(started.elapsed().as_secs_f64());
        Ok(SettlementRun {
            report,
            processing: Some(processing),
            fees_settled,
            completed: true,
        })
    }

    /// Settlements dated strictly before `today` that have not completed.
    ///
    /// Dates come from the due dates carried on merchant fees and from
    /// settlements already created. Today's settlements stay open while
    /// sales for the day can still arrive.
    pub async fn due_settlements(&self, today: NaiveDate) -> Result<Vec<DueSettlement>> {
        let store = self.repository.store();
        let mut due = BTreeSet::new();

        let fee_events = store
            .query_events(
                EventQuery::new()
                    .aggregate_type(Transaction::aggregate_type())
                    .event_type("MerchantFeeAddedToTransaction"),
            )
            .await
            .map_err(DomainError::from)?;
        for envelope in fee_events {
            let event: TransactionEvent = envelope.decode().map_err(DomainError::from)?;
            if let TransactionEvent::MerchantFeeAddedToTransaction(data) = event
                && let Some(settlement_date) = data.settlement_due_date
                && settlement_date < today
            {
                due.insert(DueSettlement {
                    estate_id: data.estate_id,
                    merchant_id: data.merchant_id,
                    settlement_date,
                });
            }
        }

        let created = store
            .query_events(
                EventQuery::new()
                    .aggregate_type(Settlement::aggregate_type())
                    .event_type("SettlementCreatedForDate"),
            )
            .await
            .map_err(DomainError::from)?;
        for envelope in created {
            let event: SettlementEvent = envelope.decode().map_err(DomainError::from)?;
            if let SettlementEvent::SettlementCreatedForDate(data) = event
                && data.settlement_date < today
            {
                due.insert(DueSettlement {
                    estate_id: data.estate_id,
                    merchant_id: data.merchant_id,
                    settlement_date: data.settlement_date,
                });
            }
        }

        let mut open = Vec::with_capacity(due.len());
        for candidate in due {
            let settlement_id = Settlement::id_for(
                candidate.estate_id,
                candidate.merchant_id,
                candidate.settlement_date,
            );
            let settlement: Settlement = self.repository.get_latest_version(settlement_id).await?;
            if !settlement.is_completed() {
                open.push(candidate);
            }
        }
        Ok(open)
    }

    /// Processes every due settlement. A failing settlement is logged and
    /// skipped; cancellation stops the run between settlements.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run_due(
        &self,
        today: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<SettlementRun>> {
        let mut runs = Vec::new();
        for due in self.due_settlements(today).await? {
            if cancel.is_cancelled() {
                break;
            }
            match self
                .process_settlement(due.estate_id, due.merchant_id, due.settlement_date, cancel)
                .await
            {
                Ok(run) => runs.push(run),
                Err(SettlementError::Cancelled) => break,
                Err(e) => tracing::warn!(
                    merchant_id = %due.merchant_id,
                    settlement_date = %due.settlement_date,
                    error = %e,
                    "settlement run failed"
                ),
            }
        }
        Ok(runs)
    }

    async fn merchant_transactions(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Result<Vec<AggregateId>> {
        let started = self
            .repository
            .store()
            .query_events(
                EventQuery::new()
                    .aggregate_type(Transaction::aggregate_type())
                    .event_type("TransactionHasStarted"),
            )
            .await
            .map_err(DomainError::from)?;

        let mut ids = Vec::new();
        for envelope in started {
            let event: TransactionEvent = envelope.decode().map_err(DomainError::from)?;
            if event.merchant_id() == Some(merchant_id) && event.estate_id() == Some(estate_id) {
                ids.push(envelope.aggregate_id);
            }
        }
        Ok(ids)
    }

    async fn pending_fees_for(
        &self,
        details: &TransactionDetails,
        contracts: &mut HashMap<AggregateId, Contract>,
        failures: &mut Vec<AttributionFailure>,
    ) -> Result<Vec<PendingFee>> {
        let transaction_id = details.transaction_id;
        let carried: Vec<PendingFee> = details
            .merchant_fees()
            .map(|applied| pending_fee(transaction_id, &applied.fee))
            .collect();
        if !carried.is_empty() {
            return Ok(carried);
        }

        let (Some(contract_id), Some(product_id), Some(amount)) =
            (details.contract_id, details.product_id, details.amount)
        else {
            failures.push(unattributed(
                transaction_id,
                "transaction has no product details or amount".to_string(),
            ));
            return Ok(vec![]);
        };

        if !contracts.contains_key(&contract_id) {
            let contract: Contract = self.repository.get_latest_version(contract_id).await?;
            contracts.insert(contract_id, contract);
        }
        let Some(contract) = contracts.get(&contract_id).filter(|c| c.is_created()) else {
            failures.push(unattributed(
                transaction_id,
                format!("contract {contract_id} not found"),
            ));
            return Ok(vec![]);
        };
        let Some(fees) = contract.fees_for_product(product_id) else {
            failures.push(unattributed(
                transaction_id,
                format!("product {product_id} not found on contract {contract_id}"),
            ));
            return Ok(vec![]);
        };

        let merchant_fees: Vec<_> = fees
            .into_iter()
            .filter(|f| f.fee_type == FeeType::Merchant)
            .collect();
        let calculated = self
            .fees
            .calculate_fees(&merchant_fees, amount, Some(Utc::now()));
        Ok(calculated
            .iter()
            .map(|fee| pending_fee(transaction_id, fee))
            .collect())
    }

    fn record_failures(&self, report: &SettlementReport) {
        if report.is_partial() {
            metrics::counter!("settlement_fee_attribution_failures_total")
                .increment(report.failures.len() as u64);
            for failure in &report.failures {
                tracing::warn!(
                    settlement_id = %report.settlement_id,
                    transaction_id = %failure.transaction_id,
                    reason = %failure.reason,
                    "fee could not be attributed"
                );
            }
        }
    }
}

/// The settlement date a transaction belongs to: the due date carried on its
/// merchant fees, or the merchant's schedule applied to its date.
fn due_date(details: &TransactionDetails, schedule: SettlementSchedule) -> NaiveDate {
    details
        .merchant_fees()
        .find_map(|f| f.settlement_due_date)
        .unwrap_or_else(|| schedule.settlement_date_for(details.transaction_date()))
}

fn pending_fee(transaction_id: AggregateId, fee: &CalculatedFee) -> PendingFee {
    PendingFee {
        transaction_id,
        fee_id: fee.fee_id,
        calculation_type: fee.calculation_type,
        fee_value: fee.fee_value,
        calculated_value: fee.calculated_value,
        fee_calculated_date_time: fee.calculated_at,
    }
}

fn unattributed(transaction_id: AggregateId, reason: String) -> AttributionFailure {
    AttributionFailure {
        transaction_id,
        fee_id: None,
        reason,
    }
}

fn not_found_or(settlement_id: AggregateId, error: DomainError) -> SettlementError {
    match error {
        DomainError::Settlement(SettlementStateError::NotCreated) => {
            SettlementError::NotFound(settlement_id)
        }
        other => other.into(),
    }
}
