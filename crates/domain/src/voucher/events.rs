//! Voucher domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, HasEstateId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum VoucherEvent {
    VoucherGenerated(VoucherGeneratedData),
    VoucherIssued(VoucherIssuedData),
    VoucherFullyRedeemed(VoucherFullyRedeemedData),
}

impl DomainEvent for VoucherEvent {
    const EVENT_TYPES: &'static [&'static str] =
        &["VoucherGenerated", "VoucherIssued", "VoucherFullyRedeemed"];

    fn event_type(&self) -> &'static str {
        match self {
            VoucherEvent::VoucherGenerated(_) => "VoucherGenerated",
            VoucherEvent::VoucherIssued(_) => "VoucherIssued",
            VoucherEvent::VoucherFullyRedeemed(_) => "VoucherFullyRedeemed",
        }
    }
}

impl HasEstateId for VoucherEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(match self {
            VoucherEvent::VoucherGenerated(d) => d.estate_id,
            VoucherEvent::VoucherIssued(d) => d.estate_id,
            VoucherEvent::VoucherFullyRedeemed(d) => d.estate_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherGeneratedData {
    pub voucher_id: AggregateId,
    pub estate_id: AggregateId,
    pub transaction_id: AggregateId,
    pub voucher_code: String,
    pub value: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherIssuedData {
    pub voucher_id: AggregateId,
    pub estate_id: AggregateId,
    pub recipient_email: Option<String>,
    pub recipient_mobile: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherFullyRedeemedData {
    pub voucher_id: AggregateId,
    pub estate_id: AggregateId,
    pub redeemed_at: DateTime<Utc>,
}
