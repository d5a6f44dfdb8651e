use chrono::NaiveDate;
use common::AggregateId;
use domain::FeeId;
use serde::Serialize;

/// Outcome of reconciling one merchant's transactions for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementReport {
    pub settlement_id: AggregateId,
    pub settlement_date: NaiveDate,
    /// False when there was nothing to settle and no stream was created.
    pub settlement_exists: bool,
    pub fees_added: usize,
    pub fees_already_present: usize,
    /// Fee lines that could not be attributed; remediated out of band.
    pub failures: Vec<AttributionFailure>,
    /// Transactions whose fees arrived after the settlement completed.
    pub late_transactions: Vec<AggregateId>,
}

impl SettlementReport {
    pub(crate) fn new(settlement_id: AggregateId, settlement_date: NaiveDate) -> Self {
        Self {
            settlement_id,
            settlement_date,
            settlement_exists: false,
            fees_added: 0,
            fees_already_present: 0,
            failures: Vec::new(),
            late_transactions: Vec::new(),
        }
    }

    /// True when some lines could not be attributed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributionFailure {
    pub transaction_id: AggregateId,
    pub fee_id: Option<FeeId>,
    pub reason: String,
}

/// Result of a start-processing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingOutcome {
    /// This call moved the settlement from Pending to ProcessingStarted.
    Started,
    /// Processing had already started; nothing was appended.
    AlreadyStarted,
}

/// Result of a full reconcile, start, settle, complete run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRun {
    pub report: SettlementReport,
    /// None when there was no settlement to process.
    pub processing: Option<ProcessingOutcome>,
    /// Lines paid out by this run.
    pub fees_settled: usize,
    pub completed: bool,
}

/// A settlement that should be processed by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DueSettlement {
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub settlement_date: NaiveDate,
}
