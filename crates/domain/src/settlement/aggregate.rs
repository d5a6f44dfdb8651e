//! Settlement aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle};
use crate::fees::CalculationType;
use crate::value_objects::FeeId;

use super::{
    SettlementEvent, SettlementStateError, SettlementStatus,
    events::{
        MerchantFeeAddedPendingSettlementData, MerchantFeeSettledData, SettlementCompletedData,
        SettlementCreatedForDateData, SettlementProcessingStartedData,
    },
};

/// Settlement aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    #[serde(default)]
    version: Version,
    state: Lifecycle<SettlementDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementDetails {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub settlement_date: NaiveDate,
    pub status: SettlementStatus,
    pub processing_started_date_time: Option<DateTime<Utc>>,
    pub completed_date_time: Option<DateTime<Utc>>,
    /// One line per (transaction, fee), in the order they were attributed.
    pub fees: Vec<SettlementFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementFee {
    pub transaction_id: AggregateId,
    pub fee_id: FeeId,
    pub calculation_type: CalculationType,
    pub fee_value: Decimal,
    pub calculated_value: Decimal,
    pub fee_calculated_date_time: DateTime<Utc>,
    pub is_settled: bool,
    pub settled_date_time: Option<DateTime<Utc>>,
}

/// A calculated merchant fee waiting to be attributed to a settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFee {
    pub transaction_id: AggregateId,
    pub fee_id: FeeId,
    pub calculation_type: CalculationType,
    pub fee_value: Decimal,
    pub calculated_value: Decimal,
    pub fee_calculated_date_time: DateTime<Utc>,
}

impl SettlementDetails {
    pub fn has_fee(&self, transaction_id: AggregateId, fee_id: FeeId) -> bool {
        self.fee(transaction_id, fee_id).is_some()
    }

    pub fn fee(&self, transaction_id: AggregateId, fee_id: FeeId) -> Option<&SettlementFee> {
        self.fees
            .iter()
            .find(|f| f.transaction_id == transaction_id && f.fee_id == fee_id)
    }

    pub fn unsettled_fees(&self) -> impl Iterator<Item = &SettlementFee> {
        self.fees.iter().filter(|f| !f.is_settled)
    }

    pub fn total_fees(&self) -> Decimal {
        self.fees.iter().map(|f| f.calculated_value).sum()
    }
}

impl Aggregate for Settlement {
    type Event = SettlementEvent;
    type Error = SettlementStateError;

    fn aggregate_type() -> &'static str {
        "Settlement"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.settlement_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let SettlementEvent::SettlementCreatedForDate(data) = event {
            self.state = Lifecycle::Created(SettlementDetails {
                settlement_id: data.settlement_id,
                estate_id: data.estate_id,
                merchant_id: data.merchant_id,
                settlement_date: data.settlement_date,
                status: SettlementStatus::Pending,
                processing_started_date_time: None,
                completed_date_time: None,
                fees: Vec::new(),
            });
            return;
        }

        let Some(details) = self.state.get_mut() else {
            return;
        };

        match event {
            SettlementEvent::SettlementCreatedForDate(_) => {}
            SettlementEvent::MerchantFeeAddedPendingSettlement(data) => {
                if !details.has_fee(data.transaction_id, data.fee_id) {
                    details.fees.push(SettlementFee {
                        transaction_id: data.transaction_id,
                        fee_id: data.fee_id,
                        calculation_type: data.calculation_type,
                        fee_value: data.fee_value,
                        calculated_value: data.calculated_value,
                        fee_calculated_date_time: data.fee_calculated_date_time,
                        is_settled: false,
                        settled_date_time: None,
                    });
                }
            }
            SettlementEvent::SettlementProcessingStarted(data) => {
                if details.status.can_start_processing() {
                    details.status = SettlementStatus::ProcessingStarted;
                    details.processing_started_date_time =
                        Some(data.processing_started_date_time);
                }
            }
            SettlementEvent::MerchantFeeSettled(data) => {
                if let Some(fee) = details
                    .fees
                    .iter_mut()
                    .find(|f| f.transaction_id == data.transaction_id && f.fee_id == data.fee_id)
                {
                    fee.is_settled = true;
                    fee.settled_date_time = Some(data.settled_date_time);
                }
            }
            SettlementEvent::SettlementCompleted(data) => {
                details.status = SettlementStatus::Completed;
                details.completed_date_time = Some(data.completed_date_time);
            }
        }
    }
}

// Query methods
impl Settlement {
    /// The stream id every caller uses for a merchant's settlement on a date.
    pub fn id_for(
        estate_id: AggregateId,
        merchant_id: AggregateId,
        settlement_date: NaiveDate,
    ) -> AggregateId {
        AggregateId::derive(&[
            "settlement",
            &estate_id.to_string(),
            &merchant_id.to_string(),
            &settlement_date.format("%Y-%m-%d").to_string(),
        ])
    }

    pub fn details(&self) -> Option<&SettlementDetails> {
        self.state.get()
    }

    pub fn status(&self) -> Option<SettlementStatus> {
        self.details().map(|d| d.status)
    }

    pub fn is_processing_started(&self) -> bool {
        self.details()
            .is_some_and(|d| d.processing_started_date_time.is_some())
    }

    pub fn is_completed(&self) -> bool {
        self.status() == Some(SettlementStatus::Completed)
    }

    fn require_created(&self) -> Result<&SettlementDetails, SettlementStateError> {
        self.details().ok_or(SettlementStateError::NotCreated)
    }
}

// Command methods (return events)
impl Settlement {
    pub fn create(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
        settlement_date: NaiveDate,
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        if self.state.is_created() {
            return Err(SettlementStateError::AlreadyCreated);
        }

        Ok(vec![SettlementEvent::SettlementCreatedForDate(
            SettlementCreatedForDateData {
                settlement_id: Self::id_for(estate_id, merchant_id, settlement_date),
                estate_id,
                merchant_id,
                settlement_date,
            },
        )])
    }

    /// Attributes fees to the settlement. Lines already present are skipped.
    pub fn add_fees(
        &self,
        fees: &[PendingFee],
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        let details = self.require_created()?;
        if !details.status.can_add_fees() {
            return Err(SettlementStateError::InvalidStateTransition {
                status: details.status,
                action: "add fees to",
            });
        }

        let mut events: Vec<SettlementEvent> = Vec::new();
        for fee in fees {
            let duplicate_in_batch = events.iter().any(|e| {
                matches!(e, SettlementEvent::MerchantFeeAddedPendingSettlement(d)
                    if d.transaction_id == fee.transaction_id && d.fee_id == fee.fee_id)
            });
            if details.has_fee(fee.transaction_id, fee.fee_id) || duplicate_in_batch {
                continue;
            }
            events.push(SettlementEvent::MerchantFeeAddedPendingSettlement(
                MerchantFeeAddedPendingSettlementData {
                    settlement_id: details.settlement_id,
                    estate_id: details.estate_id,
                    merchant_id: details.merchant_id,
                    transaction_id: fee.transaction_id,
                    fee_id: fee.fee_id,
                    calculation_type: fee.calculation_type,
                    fee_value: fee.fee_value,
                    calculated_value: fee.calculated_value,
                    fee_calculated_date_time: fee.fee_calculated_date_time,
                },
            ));
        }
        Ok(events)
    }

    /// Pending to ProcessingStarted. Already started or completed
    /// settlements produce no events.
    pub fn start_processing(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        let details = self.require_created()?;
        if !details.status.can_start_processing() {
            return Ok(vec![]);
        }

        Ok(vec![SettlementEvent::SettlementProcessingStarted(
            SettlementProcessingStartedData {
                settlement_id: details.settlement_id,
                estate_id: details.estate_id,
                merchant_id: details.merchant_id,
                processing_started_date_time: started_at,
            },
        )])
    }

    pub fn complete(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        let details = self.require_created()?;
        if details.status.is_terminal() {
            return Ok(vec![]);
        }
        if !details.status.can_complete() {
            return Err(SettlementStateError::InvalidStateTransition {
                status: details.status,
                action: "complete",
            });
        }

        Ok(vec![SettlementEvent::SettlementCompleted(
            SettlementCompletedData {
                settlement_id: details.settlement_id,
                estate_id: details.estate_id,
                merchant_id: details.merchant_id,
                completed_date_time: completed_at,
            },
        )])
    }

    /// Marks one fee line as paid out. Settling a settled line is a no-op.
    pub fn settle_fee(
        &self,
        transaction_id: AggregateId,
        fee_id: FeeId,
        settled_at: DateTime<Utc>,
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        let details = self.require_created()?;
        let fee = details
            .fee(transaction_id, fee_id)
            .ok_or(SettlementStateError::FeeNotFound {
                transaction_id,
                fee_id,
            })?;
        if !details.status.can_settle_fees() {
            return Err(SettlementStateError::InvalidStateTransition {
                status: details.status,
                action: "settle fees on",
            });
        }
        if fee.is_settled {
            return Ok(vec![]);
        }

        Ok(vec![self.fee_settled(details, fee, settled_at)])
    }

    /// Marks every unsettled line as paid out.
    pub fn settle_all_pending(
        &self,
        settled_at: DateTime<Utc>,
    ) -> Result<Vec<SettlementEvent>, SettlementStateError> {
        let details = self.require_created()?;
        if !details.status.can_settle_fees() {
            return Err(SettlementStateError::InvalidStateTransition {
                status: details.status,
                action: "settle fees on",
            });
        }

        Ok(details
            .unsettled_fees()
            .map(|fee| self.fee_settled(details, fee, settled_at))
            .collect())
    }

    fn fee_settled(
        &self,
        details: &SettlementDetails,
        fee: &SettlementFee,
        settled_at: DateTime<Utc>,
    ) -> SettlementEvent {
        SettlementEvent::MerchantFeeSettled(MerchantFeeSettledData {
            settlement_id: details.settlement_id,
            estate_id: details.estate_id,
            merchant_id: details.merchant_id,
            transaction_id: fee.transaction_id,
            fee_id: fee.fee_id,
            calculated_value: fee.calculated_value,
            settled_date_time: settled_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn created() -> Settlement {
        let mut settlement = Settlement::default();
        let events = settlement
            .create(AggregateId::new(), AggregateId::new(), date())
            .unwrap();
        settlement.apply_events(events);
        settlement
    }

    fn pending_fee(transaction_id: AggregateId, fee_id: FeeId) -> PendingFee {
        PendingFee {
            transaction_id,
            fee_id,
            calculation_type: CalculationType::Percentage,
            fee_value: dec!(0.5),
            calculated_value: dec!(0.50),
            fee_calculated_date_time: Utc::now(),
        }
    }

    #[test]
    fn id_is_stable_per_merchant_and_date() {
        let estate = AggregateId::new();
        let merchant = AggregateId::new();
        assert_eq!(
            Settlement::id_for(estate, merchant, date()),
            Settlement::id_for(estate, merchant, date())
        );
        assert_ne!(
            Settlement::id_for(estate, merchant, date()),
            Settlement::id_for(estate, merchant, date().succ_opt().unwrap())
        );
        assert_eq!(created().status(), Some(SettlementStatus::Pending));
    }

    #[test]
    fn duplicate_fee_lines_are_skipped() {
        let mut settlement = created();
        let tx = AggregateId::new();
        let fee = FeeId::new();
        let batch = vec![pending_fee(tx, fee), pending_fee(tx, fee)];

        let events = settlement.add_fees(&batch).unwrap();
        assert_eq!(events.len(), 1);
        settlement.apply_events(events);

        assert!(settlement.add_fees(&batch).unwrap().is_empty());
        assert_eq!(settlement.details().unwrap().fees.len(), 1);
    }

    #[test]
    fn start_processing_is_idempotent() {
        let mut settlement = created();
        let at = Utc::now();
        settlement.apply_events(settlement.start_processing(at).unwrap());
        assert!(settlement.is_processing_started());

        assert!(settlement.start_processing(Utc::now()).unwrap().is_empty());
        assert_eq!(
            settlement.details().unwrap().processing_started_date_time,
            Some(at)
        );
    }

    #[test]
    fn complete_requires_processing() {
        let mut settlement = created();
        assert!(matches!(
            settlement.complete(Utc::now()),
            Err(SettlementStateError::InvalidStateTransition { .. })
        ));

        settlement.apply_events(settlement.start_processing(Utc::now()).unwrap());
        settlement.apply_events(settlement.complete(Utc::now()).unwrap());
        assert!(settlement.is_completed());
        assert!(settlement.complete(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn completed_settlement_rejects_new_fees() {
        let mut settlement = created();
        settlement.apply_events(settlement.start_processing(Utc::now()).unwrap());
        settlement.apply_events(settlement.complete(Utc::now()).unwrap());

        let result = settlement.add_fees(&[pending_fee(AggregateId::new(), FeeId::new())]);
        assert!(matches!(
            result,
            Err(SettlementStateError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn fee_lines_settle_independently_of_header() {
        let mut settlement = created();
        let tx = AggregateId::new();
        let (first, second) = (FeeId::new(), FeeId::new());
        settlement.apply_events(
            settlement
                .add_fees(&[pending_fee(tx, first), pending_fee(tx, second)])
                .unwrap(),
        );

        assert!(settlement.settle_fee(tx, first, Utc::now()).is_err());

        settlement.apply_events(settlement.start_processing(Utc::now()).unwrap());
        settlement.apply_events(settlement.complete(Utc::now()).unwrap());
        settlement.apply_events(settlement.settle_fee(tx, first, Utc::now()).unwrap());

        let details = settlement.details().unwrap();
        assert!(details.fee(tx, first).unwrap().is_settled);
        assert!(!details.fee(tx, second).unwrap().is_settled);
        assert!(settlement.settle_fee(tx, first, Utc::now()).unwrap().is_empty());

        let remaining = settlement.settle_all_pending(Utc::now()).unwrap();
        assert_eq!(remaining.len(), 1);
        settlement.apply_events(remaining);
        assert_eq!(settlement.details().unwrap().unsettled_fees().count(), 0);
        assert_eq!(settlement.details().unwrap().total_fees(), dec!(1.00));
    }

    #[test]
    fn settling_unknown_fee_fails() {
        let mut settlement = created();
        settlement.apply_events(settlement.start_processing(Utc::now()).unwrap());
        assert!(matches!(
            settlement.settle_fee(AggregateId::new(), FeeId::new(), Utc::now()),
            Err(SettlementStateError::FeeNotFound { .. })
        ));
    }
}
