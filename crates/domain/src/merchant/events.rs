//! Merchant domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SettlementSchedule;
use crate::aggregate::{DomainEvent, HasEstateId, HasMerchantId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MerchantEvent {
    MerchantCreated(MerchantCreatedData),
    MerchantNameUpdated(MerchantNameUpdatedData),
    MerchantReferenceAllocated(MerchantReferenceAllocatedData),
    AddressAdded(AddressAddedData),
    ContactAdded(ContactAddedData),
    OperatorAssignedToMerchant(OperatorAssignedToMerchantData),
    OperatorRemovedFromMerchant(OperatorRemovedFromMerchantData),
    DeviceAddedToMerchant(DeviceAddedToMerchantData),
    ContractAddedToMerchant(ContractAddedToMerchantData),
    SettlementScheduleChanged(SettlementScheduleChangedData),
    ManualDepositMade(DepositMadeData),
    AutomaticDepositMade(DepositMadeData),
    WithdrawalMade(WithdrawalMadeData),
}

impl DomainEvent for MerchantEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "MerchantCreated",
        "MerchantNameUpdated",
        "MerchantReferenceAllocated",
        "AddressAdded",
        "ContactAdded",
        "OperatorAssignedToMerchant",
        "OperatorRemovedFromMerchant",
        "DeviceAddedToMerchant",
        "ContractAddedToMerchant",
        "SettlementScheduleChanged",
        "ManualDepositMade",
        "AutomaticDepositMade",
        "WithdrawalMade",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            MerchantEvent::MerchantCreated(_) => "MerchantCreated",
            MerchantEvent::MerchantNameUpdated(_) => "MerchantNameUpdated",
            MerchantEvent::MerchantReferenceAllocated(_) => "MerchantReferenceAllocated",
            MerchantEvent::AddressAdded(_) => "AddressAdded",
            MerchantEvent::ContactAdded(_) => "ContactAdded",
            MerchantEvent::OperatorAssignedToMerchant(_) => "OperatorAssignedToMerchant",
            MerchantEvent::OperatorRemovedFromMerchant(_) => "OperatorRemovedFromMerchant",
            MerchantEvent::DeviceAddedToMerchant(_) => "DeviceAddedToMerchant",
            MerchantEvent::ContractAddedToMerchant(_) => "ContractAddedToMerchant",
            MerchantEvent::SettlementScheduleChanged(_) => "SettlementScheduleChanged",
            MerchantEvent::ManualDepositMade(_) => "ManualDepositMade",
            MerchantEvent::AutomaticDepositMade(_) => "AutomaticDepositMade",
            MerchantEvent::WithdrawalMade(_) => "WithdrawalMade",
        }
    }
}

impl MerchantEvent {
    fn ids(&self) -> (AggregateId, AggregateId) {
        match self {
            MerchantEvent::MerchantCreated(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::MerchantNameUpdated(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::MerchantReferenceAllocated(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::AddressAdded(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::ContactAdded(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::OperatorAssignedToMerchant(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::OperatorRemovedFromMerchant(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::DeviceAddedToMerchant(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::ContractAddedToMerchant(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::SettlementScheduleChanged(d) => (d.estate_id, d.merchant_id),
            MerchantEvent::ManualDepositMade(d) | MerchantEvent::AutomaticDepositMade(d) => {
                (d.estate_id, d.merchant_id)
            }
            MerchantEvent::WithdrawalMade(d) => (d.estate_id, d.merchant_id),
        }
    }
}

impl HasEstateId for MerchantEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(self.ids().0)
    }
}

impl HasMerchantId for MerchantEvent {
    fn merchant_id(&self) -> Option<AggregateId> {
        Some(self.ids().1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantCreatedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantNameUpdatedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantReferenceAllocatedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressAddedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub address_id: Uuid,
    pub address_line_1: String,
    pub town: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactAddedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub contact_id: Uuid,
    pub name: String,
    pub email_address: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorAssignedToMerchantData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
    pub name: String,
    pub merchant_number: Option<String>,
    pub terminal_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRemovedFromMerchantData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAddedToMerchantData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub device_id: Uuid,
    pub device_identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractAddedToMerchantData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub contract_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementScheduleChangedData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub schedule: SettlementSchedule,
    pub next_settlement_date: NaiveDate,
}

/// Shared by manual and automatic deposits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositMadeData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub deposit_id: Uuid,
    pub reference: String,
    pub deposit_date_time: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalMadeData {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub withdrawal_id: Uuid,
    pub withdrawal_date_time: DateTime<Utc>,
    pub amount: Decimal,
}
