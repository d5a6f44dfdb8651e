//! Settlement domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, HasEstateId, HasMerchantId};
use crate::fees::CalculationType;
use crate::value_objects::FeeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SettlementEvent {
    SettlementCreatedForDate(SettlementCreatedForDateData),
    MerchantFeeAddedPendingSettlement(MerchantFeeAddedPendingSettlementData),
    SettlementProcessingStarted(SettlementProcessingStartedData),
    MerchantFeeSettled(MerchantFeeSettledData),
    SettlementCompleted(SettlementCompletedData),
}

impl DomainEvent for SettlementEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "SettlementCreatedForDate",
        "MerchantFeeAddedPendingSettlement",
        "SettlementProcessingStarted",
        "MerchantFeeSettled",
        "SettlementCompleted",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            SettlementEvent::SettlementCreatedForDate(_) => "SettlementCreatedForDate",
            SettlementEvent::MerchantFeeAddedPendingSettlement(_) => {
                "MerchantFeeAddedPendingSettlement"
            }
            SettlementEvent::SettlementProcessingStarted(_) => "SettlementProcessingStarted",
            SettlementEvent::MerchantFeeSettled(_) => "MerchantFeeSettled",
            SettlementEvent::SettlementCompleted(_) => "SettlementCompleted",
        }
    }
}

impl SettlementEvent {
    pub fn settlement_id(&self) -> AggregateId {
        match self {
            SettlementEvent::SettlementCreatedForDate(d) => d.settlement_id,
            SettlementEvent::MerchantFeeAddedPendingSettlement(d) => d.settlement_id,
            SettlementEvent::SettlementProcessingStarted(d) => d.settlement_id,
            SettlementEvent::MerchantFeeSettled(d) => d.settlement_id,
            SettlementEvent::SettlementCompleted(d) => d.settlement_id,
        }
    }

    fn ids(&self) -> (AggregateId, AggregateId) {
        match self {
            SettlementEvent::SettlementCreatedForDate(d) => (d.estate_id, d.merchant_id),
            SettlementEvent::MerchantFeeAddedPendingSettlement(d) => (d.estate_id, d.merchant_id),
            SettlementEvent::SettlementProcessingStarted(d) => (d.estate_id, d.merchant_id),
            SettlementEvent::MerchantFeeSettled(d) => (d.estate_id, d.merchant_id),
            SettlementEvent::SettlementCompleted(d) => (d.estate_id, d.merchant_id),
        }
    }
}

impl HasEstateId for SettlementEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(self.ids().0)
    }
}

impl HasMerchantId for SettlementEvent {
    fn merchant_id(&self) -> Option<AggregateId> {
        Some(self.ids().1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementCreatedForDateData {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub settlement_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantFeeAddedPendingSettlementData {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_id: AggregateId,
    pub fee_id: FeeId,
    pub calculation_type: CalculationType,
    pub fee_value: Decimal,
    pub calculated_value: Decimal,
    pub fee_calculated_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementProcessingStartedData {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub processing_started_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantFeeSettledData {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub transaction_id: AggregateId,
    pub fee_id: FeeId,
    pub calculated_value: Decimal,
    pub settled_date_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementCompletedData {
    pub settlement_id: AggregateId,
    pub estate_id: AggregateId,
    pub merchant_id: AggregateId,
    pub completed_date_time: DateTime<Utc>,
}
