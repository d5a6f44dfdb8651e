//! Catalog read model: the listings behind estate, merchant, contract,
//! operator and voucher lookups.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use domain::{
    ContractEvent, EstateEvent, FeeId, HasMerchantId, MerchantEvent, OperatorEvent, ProductId,
    SettlementSchedule, VoucherEvent,
};
use event_store::{EventEnvelope, RecordedEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Applied, Projection, ProjectionPosition};
use crate::store::{Table, ViewState, WriterConfig, apply_once};

use super::decode_known;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstateOperatorEntry {
    pub operator_id: AggregateId,
    pub name: String,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstateSummary {
    pub estate_id: AggregateId,
    pub name: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub operators: Vec<EstateOperatorEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorSummary {
    pub operator_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub require_custom_merchant_number: bool,
    pub require_custom_terminal_number: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantOperatorEntry {
    pub operator_id: AggregateId,
    pub name: String,
    pub merchant_number: Option<String>,
    pub terminal_number: Option<String>,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantSummary {
    pub merchant_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settlement_schedule: SettlementSchedule,
    pub next_settlement_date: Option<NaiveDate>,
    pub operators: Vec<MerchantOperatorEntry>,
    pub devices: Vec<String>,
    pub contract_ids: Vec<AggregateId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub display_text: String,
    /// None for variable-value products.
    pub value: Option<Decimal>,
    pub enabled_fee_ids: Vec<FeeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSummary {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
    pub description: String,
    pub products: Vec<ContractProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoucherCodeEntry {
    pub voucher_id: AggregateId,
    pub estate_id: AggregateId,
    pub voucher_code: String,
}

#[derive(Debug)]
struct CatalogTables {
    estates: Table<AggregateId, EstateSummary>,
    operators: Table<AggregateId, OperatorSummary>,
    merchants: Table<AggregateId, MerchantSummary>,
    contracts: Table<AggregateId, ContractSummary>,
    voucher_codes: Table<(AggregateId, String), VoucherCodeEntry>,
}

impl Default for CatalogTables {
    fn default() -> Self {
        Self {
            estates: Table::new("estates"),
            operators: Table::new("operators"),
            merchants: Table::new("merchants"),
            contracts: Table::new("contracts"),
            voucher_codes: Table::new("voucher_codes"),
        }
    }
}

impl CatalogTables {
    fn apply(&mut self, event: &EventEnvelope) -> Result<bool> {
        match event.aggregate_type.as_str() {
            "Estate" => Ok(decode_known::<EstateEvent>(event)?
                .is_some_and(|e| self.apply_estate(e))),
            "Operator" => Ok(decode_known::<OperatorEvent>(event)?
                .is_some_and(|e| self.apply_operator(e))),
            "Merchant" => Ok(decode_known::<MerchantEvent>(event)?
                .is_some_and(|e| self.apply_merchant(e))),
            "Contract" => Ok(decode_known::<ContractEvent>(event)?
                .is_some_and(|e| self.apply_contract(e))),
            "Voucher" => Ok(decode_known::<VoucherEvent>(event)?
                .is_some_and(|e| self.apply_voucher(e))),
            _ => Ok(false),
        }
    }

    fn apply_estate(&mut self, event: EstateEvent) -> bool {
        match event {
            EstateEvent::EstateCreated(data) => {
                self.estates
                    .get_or_insert_with(data.estate_id, || EstateSummary {
                        estate_id: data.estate_id,
                        name: data.name.clone(),
                        reference: None,
                        created_at: data.created_at,
                        operators: Vec::new(),
                    });
            }
            EstateEvent::EstateReferenceAllocated(data) => {
                if let Some(estate) = self.estates.get_mut(&data.estate_id) {
                    estate.reference = Some(data.reference);
                }
            }
            EstateEvent::OperatorAssignedToEstate(data) => {
                if let Some(estate) = self.estates.get_mut(&data.estate_id) {
                    match estate
                        .operators
                        .iter_mut()
                        .find(|o| o.operator_id == data.operator_id)
                    {
                        Some(existing) => {
                            existing.name = data.name;
                            existing.is_deleted = false;
                        }
                        None => estate.operators.push(EstateOperatorEntry {
                            operator_id: data.operator_id,
                            name: data.name,
                            is_deleted: false,
                        }),
                    }
                }
            }
            EstateEvent::OperatorRemovedFromEstate(data) => {
                if let Some(estate) = self.estates.get_mut(&data.estate_id)
                    && let Some(operator) = estate
                        .operators
                        .iter_mut()
                        .find(|o| o.operator_id == data.operator_id)
                {
                    operator.is_deleted = true;
                }
            }
            EstateEvent::SecurityUserAddedToEstate(_) => return false,
        }
        true
    }

    fn apply_operator(&mut self, event: OperatorEvent) -> bool {
        match event {
            OperatorEvent::OperatorCreated(data) => {
                self.operators
                    .get_or_insert_with(data.operator_id, || OperatorSummary {
                        operator_id: data.operator_id,
                        estate_id: data.estate_id,
                        name: data.name.clone(),
                        require_custom_merchant_number: data.require_custom_merchant_number,
                        require_custom_terminal_number: data.require_custom_terminal_number,
                    });
            }
            OperatorEvent::OperatorNameUpdated(data) => {
                if let Some(operator) = self.operators.get_mut(&data.operator_id) {
                    operator.name = data.name;
                }
            }
            OperatorEvent::OperatorRequirementsChanged(data) => {
                if let Some(operator) = self.operators.get_mut(&data.operator_id) {
                    operator.require_custom_merchant_number = data.require_custom_merchant_number;
                    operator.require_custom_terminal_number = data.require_custom_terminal_number;
                }
            }
        }
        true
    }

    fn apply_merchant(&mut self, event: MerchantEvent) -> bool {
        if let MerchantEvent::MerchantCreated(data) = &event {
            self.merchants
                .get_or_insert_with(data.merchant_id, || MerchantSummary {
                    merchant_id: data.merchant_id,
                    estate_id: data.estate_id,
                    name: data.name.clone(),
                    reference: None,
                    created_at: data.created_at,
                    settlement_schedule: SettlementSchedule::default(),
                    next_settlement_date: None,
                    operators: Vec::new(),
                    devices: Vec::new(),
                    contract_ids: Vec::new(),
                });
            return true;
        }

        let Some(merchant_id) = event.merchant_id() else {
            return false;
        };
        let Some(merchant) = self.merchants.get_mut(&merchant_id) else {
            return false;
        };

        match event {
            MerchantEvent::MerchantCreated(_) => {}
            MerchantEvent::MerchantNameUpdated(data) => merchant.name = data.name,
            MerchantEvent::MerchantReferenceAllocated(data) => {
                merchant.reference = Some(data.reference);
            }
            MerchantEvent::OperatorAssignedToMerchant(data) => {
                merchant.operators.retain(|o| o.operator_id != data.operator_id);
                merchant.operators.push(MerchantOperatorEntry {
                    operator_id: data.operator_id,
                    name: data.name,
                    merchant_number: data.merchant_number,
                    terminal_number: data.terminal_number,
                    is_deleted: false,
                });
            }
            MerchantEvent::OperatorRemovedFromMerchant(data) => {
                if let Some(operator) = merchant
                    .operators
                    .iter_mut()
                    .find(|o| o.operator_id == data.operator_id)
                {
                    operator.is_deleted = true;
                }
            }
            MerchantEvent::DeviceAddedToMerchant(data) => {
                if !merchant.devices.contains(&data.device_identifier) {
                    merchant.devices.push(data.device_identifier);
                }
            }
            MerchantEvent::ContractAddedToMerchant(data) => {
                if !merchant.contract_ids.contains(&data.contract_id) {
                    merchant.contract_ids.push(data.contract_id);
                }
            }
            MerchantEvent::SettlementScheduleChanged(data) => {
                merchant.settlement_schedule = data.schedule;
                merchant.next_settlement_date = Some(data.next_settlement_date);
            }
            MerchantEvent::AddressAdded(_)
            | MerchantEvent::ContactAdded(_)
            | MerchantEvent::ManualDepositMade(_)
            | MerchantEvent::AutomaticDepositMade(_)
            | MerchantEvent::WithdrawalMade(_) => return false,
        }
        true
    }

    fn apply_contract(&mut self, event: ContractEvent) -> bool {
        match event {
            ContractEvent::ContractCreated(data) => {
                self.contracts
                    .get_or_insert_with(data.contract_id, || ContractSummary {
                        contract_id: data.contract_id,
                        estate_id: data.estate_id,
                        operator_id: data.operator_id,
                        description: data.description.clone(),
                        products: Vec::new(),
                    });
            }
            ContractEvent::FixedValueProductAddedToContract(data)
            | ContractEvent::VariableValueProductAddedToContract(data) => {
                if let Some(contract) = self.contracts.get_mut(&data.contract_id)
                    && !contract.products.iter().any(|p| p.product_id == data.product_id)
                {
                    contract.products.push(ContractProductSummary {
                        product_id: data.product_id,
                        name: data.product_name,
                        display_text: data.display_text,
                        value: data.value,
                        enabled_fee_ids: Vec::new(),
                    });
                }
            }
            ContractEvent::TransactionFeeAddedToProduct(data) => {
                if let Some(product) = self.product_mut(data.contract_id, data.product_id)
                    && !product.enabled_fee_ids.contains(&data.fee_id)
                {
                    product.enabled_fee_ids.push(data.fee_id);
                }
            }
            ContractEvent::TransactionFeeForProductDisabled(data) => {
                if let Some(product) = self.product_mut(data.contract_id, data.product_id) {
                    product.enabled_fee_ids.retain(|f| *f != data.fee_id);
                }
            }
        }
        true
    }

    fn apply_voucher(&mut self, event: VoucherEvent) -> bool {
        let VoucherEvent::VoucherGenerated(data) = event else {
            return false;
        };
        self.voucher_codes.upsert(
            (data.estate_id, data.voucher_code.clone()),
            VoucherCodeEntry {
                voucher_id: data.voucher_id,
                estate_id: data.estate_id,
                voucher_code: data.voucher_code,
            },
        );
        true
    }

    fn product_mut(
        &mut self,
        contract_id: AggregateId,
        product_id: ProductId,
    ) -> Option<&mut ContractProductSummary> {
        self.contracts
            .get_mut(&contract_id)?
            .products
            .iter_mut()
            .find(|p| p.product_id == product_id)
    }
}

/// Listing projection family for estates, operators, merchants, contracts
/// and voucher codes.
#[derive(Clone)]
pub struct CatalogView {
    state: Arc<RwLock<ViewState<CatalogTables>>>,
    config: WriterConfig,
}

impl CatalogView {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(ViewState::default())),
            config,
        }
    }

    pub async fn estate(&self, estate_id: AggregateId) -> Option<EstateSummary> {
        self.state.read().await.model.estates.get(&estate_id).cloned()
    }

    pub async fn estates(&self) -> Vec<EstateSummary> {
        self.state.read().await.model.estates.filter(|_| true)
    }

    pub async fn merchant(&self, merchant_id: AggregateId) -> Option<MerchantSummary> {
        self.state
            .read()
            .await
            .model
            .merchants
            .get(&merchant_id)
            .cloned()
    }

    pub async fn merchants(&self, estate_id: AggregateId) -> Vec<MerchantSummary> {
        self.state
            .read()
            .await
            .model
            .merchants
            .filter(|m| m.estate_id == estate_id)
    }

    pub async fn contracts(&self, estate_id: AggregateId) -> Vec<ContractSummary> {
        self.state
            .read()
            .await
            .model
            .contracts
            .filter(|c| c.estate_id == estate_id)
    }

    /// Contracts assigned to a merchant, in assignment order.
    pub async fn merchant_contracts(
        &self,
        estate_id: AggregateId,
        merchant_id: AggregateId,
    ) -> Vec<ContractSummary> {
        let state = self.state.read().await;
        let Some(merchant) = state
            .model
            .merchants
            .get(&merchant_id)
            .filter(|m| m.estate_id == estate_id)
        else {
            return Vec::new();
        };
        merchant
            .contract_ids
            .iter()
            .filter_map(|id| state.model.contracts.get(id).cloned())
            .collect()
    }

    pub async fn operators(&self, estate_id: AggregateId) -> Vec<OperatorSummary> {
        self.state
            .read()
            .await
            .model
            .operators
            .filter(|o| o.estate_id == estate_id)
    }

    pub async fn voucher_id_by_code(
        &self,
        estate_id: AggregateId,
        voucher_code: &str,
    ) -> Option<AggregateId> {
        self.state
            .read()
            .await
            .model
            .voucher_codes
            .get(&(estate_id, voucher_code.to_string()))
            .map(|v| v.voucher_id)
    }
}

impl Default for CatalogView {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

#[async_trait]
impl Projection for CatalogView {
    fn name(&self) -> &'static str {
        "CatalogView"
    }

    fn aggregate_types(&self) -> &'static [&'static str] {
        &["Estate", "Operator", "Merchant", "Contract", "Voucher"]
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
