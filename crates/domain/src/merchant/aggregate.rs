//! Merchant aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Lifecycle};

use super::{
    MerchantError, MerchantEvent, SettlementSchedule,
    events::{
        AddressAddedData, ContactAddedData, ContractAddedToMerchantData, DepositMadeData,
        DeviceAddedToMerchantData, MerchantCreatedData, MerchantNameUpdatedData,
        MerchantReferenceAllocatedData, OperatorAssignedToMerchantData,
        OperatorRemovedFromMerchantData, SettlementScheduleChangedData, WithdrawalMadeData,
    },
};

/// Merchant aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    #[serde(default)]
    version: Version,
    state: Lifecycle<MerchantDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantDetails {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub addresses: Vec<MerchantAddress>,
    pub contacts: Vec<MerchantContact>,
    pub operators: Vec<MerchantOperator>,
    pub devices: Vec<MerchantDevice>,
    pub contracts: Vec<AggregateId>,
    pub settlement_schedule: SettlementSchedule,
    pub next_settlement_date: Option<NaiveDate>,
    pub deposits: Vec<Deposit>,
    pub withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantAddress {
    pub address_id: Uuid,
    pub address_line_1: String,
    pub town: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantContact {
    pub contact_id: Uuid,
    pub name: String,
    pub email_address: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantOperator {
    pub operator_id: AggregateId,
    pub name: String,
    pub merchant_number: Option<String>,
    pub terminal_number: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantDevice {
    pub device_id: Uuid,
    pub device_identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositSource {
    Manual,
    Automatic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub deposit_id: Uuid,
    pub source: DepositSource,
    pub reference: String,
    pub deposit_date_time: DateTime<Utc>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: Uuid,
    pub withdrawal_date_time: DateTime<Utc>,
    pub amount: Decimal,
}

impl Aggregate for Merchant {
    type Event = MerchantEvent;
    type Error = MerchantError;

    fn aggregate_type() -> &'static str {
        "Merchant"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.merchant_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let MerchantEvent::MerchantCreated(data) = event {
            self.state = Lifecycle::Created(MerchantDetails {
                merchant_id: data.merchant_id,
                estate_id: data.estate_id,
                name: data.name,
                reference: None,
                created_at: data.created_at,
                addresses: Vec::new(),
                contacts: Vec::new(),
                operators: Vec::new(),
                devices: Vec::new(),
                contracts: Vec::new(),
                settlement_schedule: SettlementSchedule::default(),
                next_settlement_date: None,
                deposits: Vec::new(),
                withdrawals: Vec::new(),
            });
            return;
        }

        let Some(details) = self.state.get_mut() else {
            return;
        };

        match event {
            MerchantEvent::MerchantCreated(_) => {}
            MerchantEvent::MerchantNameUpdated(data) => details.name = data.name,
            MerchantEvent::MerchantReferenceAllocated(data) => {
                details.reference = Some(data.reference);
            }
            MerchantEvent::AddressAdded(data) => details.addresses.push(MerchantAddress {
                address_id: data.address_id,
                address_line_1: data.address_line_1,
                town: data.town,
                region: data.region,
                postal_code: data.postal_code,
                country: data.country,
            }),
            MerchantEvent::ContactAdded(data) => details.contacts.push(MerchantContact {
                contact_id: data.contact_id,
                name: data.name,
                email_address: data.email_address,
                phone_number: data.phone_number,
            }),
            MerchantEvent::OperatorAssignedToMerchant(data) => {
                details.operators.retain(|o| o.operator_id != data.operator_id);
                details.operators.push(MerchantOperator {
                    operator_id: data.operator_id,
                    name: data.name,
                    merchant_number: data.merchant_number,
                    terminal_number: data.terminal_number,
                    is_deleted: false,
                });
            }
            MerchantEvent::OperatorRemovedFromMerchant(data) => {
                if let Some(operator) = details
                    .operators
                    .iter_mut()
                    .find(|o| o.operator_id == data.operator_id)
                {
                    operator.is_deleted = true;
                }
            }
            MerchantEvent::DeviceAddedToMerchant(data) => details.devices.push(MerchantDevice {
                device_id: data.device_id,
                device_identifier: data.device_identifier,
            }),
            MerchantEvent::ContractAddedToMerchant(data) => {
                if !details.contracts.contains(&data.contract_id) {
                    details.contracts.push(data.contract_id);
                }
            }
            MerchantEvent::SettlementScheduleChanged(data) => {
                details.settlement_schedule = data.schedule;
                details.next_settlement_date = Some(data.next_settlement_date);
            }
            MerchantEvent::ManualDepositMade(data) => {
                details.deposits.push(deposit(data, DepositSource::Manual));
            }
            MerchantEvent::AutomaticDepositMade(data) => {
                details.deposits.push(deposit(data, DepositSource::Automatic));
            }
            MerchantEvent::WithdrawalMade(data) => details.withdrawals.push(Withdrawal {
                withdrawal_id: data.withdrawal_id,
                withdrawal_date_time: data.withdrawal_date_time,
                amount: data.amount,
            }),
        }
    }
}

fn deposit(data: DepositMadeData, source: DepositSource) -> Deposit {
    Deposit {
        deposit_id: data.deposit_id,
        source,
        reference: data.reference,
        deposit_date_time: data.deposit_date_time,
        amount: data.amount,
    }
}

// Query methods
impl Merchant {
    pub fn details(&self) -> Option<&MerchantDetails> {
        self.state.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.details().map(|d| d.name.as_str())
    }

    pub fn estate_id(&self) -> Option<AggregateId> {
        self.details().map(|d| d.estate_id)
    }

    pub fn settlement_schedule(&self) -> SettlementSchedule {
        self.details()
            .map(|d| d.settlement_schedule)
            .unwrap_or_default()
    }

    pub fn active_operators(&self) -> impl Iterator<Item = &MerchantOperator> {
        self.details()
            .into_iter()
            .flat_map(|d| d.operators.iter())
            .filter(|o| !o.is_deleted)
    }

    fn require_created(&self) -> Result<&MerchantDetails, MerchantError> {
        self.details().ok_or(MerchantError::NotCreated)
    }
}

// Command methods (return events)
impl Merchant {
    pub fn create(
        &self,
        merchant_id: AggregateId,
        estate_id: AggregateId,
        name: impl Into<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        if self.state.is_created() {
            return Err(MerchantError::AlreadyCreated);
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MerchantError::NameRequired);
        }

        Ok(vec![MerchantEvent::MerchantCreated(MerchantCreatedData {
            merchant_id,
            estate_id,
            name,
            created_at: Utc::now(),
        })])
    }

    pub fn update_name(&self, name: impl Into<String>) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MerchantError::NameRequired);
        }
        if name == details.name {
            return Ok(vec![]);
        }

        Ok(vec![MerchantEvent::MerchantNameUpdated(
            MerchantNameUpdatedData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                name,
            },
        )])
    }

    pub fn allocate_reference(
        &self,
        reference: impl Into<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        let reference = reference.into();

        match &details.reference {
            Some(existing) if *existing == reference => Ok(vec![]),
            Some(_) => Err(MerchantError::ReferenceAlreadyAllocated),
            None => Ok(vec![MerchantEvent::MerchantReferenceAllocated(
                MerchantReferenceAllocatedData {
                    merchant_id: details.merchant_id,
                    estate_id: details.estate_id,
                    reference,
                },
            )]),
        }
    }

    pub fn add_address(
        &self,
        address_line_1: impl Into<String>,
        town: impl Into<String>,
        region: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        Ok(vec![MerchantEvent::AddressAdded(AddressAddedData {
            merchant_id: details.merchant_id,
            estate_id: details.estate_id,
            address_id: Uuid::new_v4(),
            address_line_1: address_line_1.into(),
            town: town.into(),
            region: region.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        })])
    }

    pub fn add_contact(
        &self,
        name: impl Into<String>,
        email_address: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        Ok(vec![MerchantEvent::ContactAdded(ContactAddedData {
            merchant_id: details.merchant_id,
            estate_id: details.estate_id,
            contact_id: Uuid::new_v4(),
            name: name.into(),
            email_address: email_address.into(),
            phone_number: phone_number.into(),
        })])
    }

    pub fn assign_operator(
        &self,
        operator_id: AggregateId,
        name: impl Into<String>,
        merchant_number: Option<String>,
        terminal_number: Option<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        if self.active_operators().any(|o| o.operator_id == operator_id) {
            return Err(MerchantError::OperatorAlreadyAssigned { operator_id });
        }

        Ok(vec![MerchantEvent::OperatorAssignedToMerchant(
            OperatorAssignedToMerchantData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                operator_id,
                name: name.into(),
                merchant_number,
                terminal_number,
            },
        )])
    }

    pub fn remove_operator(
        &self,
        operator_id: AggregateId,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        let operator = details
            .operators
            .iter()
            .find(|o| o.operator_id == operator_id)
            .ok_or(MerchantError::OperatorNotAssigned { operator_id })?;
        if operator.is_deleted {
            return Ok(vec![]);
        }

        Ok(vec![MerchantEvent::OperatorRemovedFromMerchant(
            OperatorRemovedFromMerchantData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                operator_id,
            },
        )])
    }

    pub fn add_device(
        &self,
        device_identifier: impl Into<String>,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        let device_identifier = device_identifier.into();
        if details
            .devices
            .iter()
            .any(|d| d.device_identifier == device_identifier)
        {
            return Err(MerchantError::DuplicateDevice(device_identifier));
        }

        Ok(vec![MerchantEvent::DeviceAddedToMerchant(
            DeviceAddedToMerchantData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                device_id: Uuid::new_v4(),
                device_identifier,
            },
        )])
    }

    pub fn add_contract(
        &self,
        contract_id: AggregateId,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        if details.contracts.contains(&contract_id) {
            return Ok(vec![]);
        }

        Ok(vec![MerchantEvent::ContractAddedToMerchant(
            ContractAddedToMerchantData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                contract_id,
            },
        )])
    }

    /// Changes the schedule; the next settlement date is computed from `today`.
    pub fn set_settlement_schedule(
        &self,
        schedule: SettlementSchedule,
        today: NaiveDate,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        if details.settlement_schedule == schedule && details.next_settlement_date.is_some() {
            return Ok(vec![]);
        }

        Ok(vec![MerchantEvent::SettlementScheduleChanged(
            SettlementScheduleChangedData {
                merchant_id: details.merchant_id,
                estate_id: details.estate_id,
                schedule,
                next_settlement_date: schedule.settlement_date_for(today),
            },
        )])
    }

    pub fn make_deposit(
        &self,
        source: DepositSource,
        reference: impl Into<String>,
        deposit_date_time: DateTime<Utc>,
        amount: Decimal,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        if amount <= Decimal::ZERO {
            return Err(MerchantError::InvalidAmount(amount));
        }
        let reference = reference.into();
        let duplicate = details.deposits.iter().any(|d| {
            d.deposit_date_time.date_naive() == deposit_date_time.date_naive()
                && d.amount == amount
                && d.reference == reference
        });
        if duplicate {
            return Err(MerchantError::DuplicateDeposit);
        }

        let data = DepositMadeData {
            merchant_id: details.merchant_id,
            estate_id: details.estate_id,
            deposit_id: Uuid::new_v4(),
            reference,
            deposit_date_time,
            amount,
        };
        Ok(vec![match source {
            DepositSource::Manual => MerchantEvent::ManualDepositMade(data),
            DepositSource::Automatic => MerchantEvent::AutomaticDepositMade(data),
        }])
    }

    pub fn make_withdrawal(
        &self,
        withdrawal_date_time: DateTime<Utc>,
        amount: Decimal,
    ) -> Result<Vec<MerchantEvent>, MerchantError> {
        let details = self.require_created()?;
        if amount <= Decimal::ZERO {
            return Err(MerchantError::InvalidAmount(amount));
        }

        Ok(vec![MerchantEvent::WithdrawalMade(WithdrawalMadeData {
            merchant_id: details.merchant_id,
            estate_id: details.estate_id,
            withdrawal_id: Uuid::new_v4(),
            withdrawal_date_time,
            amount,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn created_merchant() -> Merchant {
        let mut merchant = Merchant::default();
        let events = merchant
            .create(AggregateId::new(), AggregateId::new(), "Corner Shop")
            .unwrap();
        merchant.apply_events(events);
        merchant
    }

    #[test]
    fn new_merchant_settles_immediately() {
        let merchant = created_merchant();
        assert_eq!(merchant.settlement_schedule(), SettlementSchedule::Immediate);
        assert!(merchant.details().unwrap().next_settlement_date.is_none());
    }

    #[test]
    fn duplicate_deposit_is_rejected() {
        let mut merchant = created_merchant();
        let at = Utc::now();
        merchant.apply_events(
            merchant
                .make_deposit(DepositSource::Manual, "REF-1", at, dec!(100.00))
                .unwrap(),
        );

        let again = merchant.make_deposit(DepositSource::Manual, "REF-1", at, dec!(100.00));
        assert!(matches!(again, Err(MerchantError::DuplicateDeposit)));

        // Same reference, different amount is fine
        assert!(
            merchant
                .make_deposit(DepositSource::Automatic, "REF-1", at, dec!(50.00))
                .is_ok()
        );
    }

    #[test]
    fn deposit_must_be_positive() {
        let merchant = created_merchant();
        let result = merchant.make_deposit(DepositSource::Manual, "R", Utc::now(), dec!(0));
        assert!(matches!(result, Err(MerchantError::InvalidAmount(_))));
    }

    #[test]
    fn schedule_change_sets_next_settlement_date() {
        let mut merchant = created_merchant();
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        merchant.apply_events(
            merchant
                .set_settlement_schedule(SettlementSchedule::Weekly, today)
                .unwrap(),
        );

        let details = merchant.details().unwrap();
        assert_eq!(details.settlement_schedule, SettlementSchedule::Weekly);
        assert_eq!(
            details.next_settlement_date,
            NaiveDate::from_ymd_opt(2024, 5, 8)
        );
    }

    #[test]
    fn operator_reassignment_after_removal() {
        let mut merchant = created_merchant();
        let operator_id = AggregateId::new();

        merchant.apply_events(
            merchant
                .assign_operator(operator_id, "Safaricom", Some("0001".into()), None)
                .unwrap(),
        );
        merchant.apply_events(merchant.remove_operator(operator_id).unwrap());
        assert_eq!(merchant.active_operators().count(), 0);

        merchant.apply_events(
            merchant
                .assign_operator(operator_id, "Safaricom", Some("0002".into()), None)
                .unwrap(),
        );
        let operators = &merchant.details().unwrap().operators;
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].merchant_number.as_deref(), Some("0002"));
    }

    #[test]
    fn devices_and_contracts() {
        let mut merchant = created_merchant();
        merchant.apply_events(merchant.add_device("EMULATOR-1").unwrap());
        assert!(matches!(
            merchant.add_device("EMULATOR-1"),
            Err(MerchantError::DuplicateDevice(_))
        ));

        let contract_id = AggregateId::new();
        merchant.apply_events(merchant.add_contract(contract_id).unwrap());
        assert!(merchant.add_contract(contract_id).unwrap().is_empty());
        assert_eq!(merchant.details().unwrap().contracts, vec![contract_id]);
    }
}
