use common::AggregateId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle};
use crate::fees::{CalculationType, FeeType, TransactionFeeToCalculate};
use crate::value_objects::{FeeId, ProductId};

use super::{
    ContractError, ContractEvent,
    events::{
        ContractCreatedData, ProductAddedData, TransactionFeeAddedToProductData,
        TransactionFeeForProductDisabledData,
    },
};

/// Contract aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    #[serde(default)]
    version: Version,
    state: Lifecycle<ContractDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDetails {
    pub contract_id: AggregateId,
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
    pub description: String,
    pub products: Vec<ContractProduct>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractProduct {
    pub product_id: ProductId,
    pub name: String,
    pub display_text: String,
    /// `None` for variable value products.
    pub value: Option<Decimal>,
    pub fees: Vec<ProductFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFee {
    pub fee_id: FeeId,
    pub description: String,
    pub calculation_type: CalculationType,
    pub fee_type: FeeType,
    pub value: Decimal,
    pub is_enabled: bool,
}

impl ProductFee {
    pub fn to_calculate(&self) -> TransactionFeeToCalculate {
        TransactionFeeToCalculate {
            fee_id: self.fee_id,
            calculation_type: self.calculation_type,
            fee_type: self.fee_type,
            value: self.value,
        }
    }
}

impl Aggregate for Contract {
    type Event = ContractEvent;
    type Error = ContractError;

    fn aggregate_type() -> &'static str {
        "Contract"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.contract_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let ContractEvent::ContractCreated(data) = event {
            self.state = Lifecycle::Created(ContractDetails {
                contract_id: data.contract_id,
                estate_id: data.estate_id,
                operator_id: data.operator_id,
                description: data.description,
                products: Vec::new(),
            });
            return;
        }

        let Some(details) = self.state.get_mut() else {
            return;
        };

        match event {
            ContractEvent::ContractCreated(_) => {}
            ContractEvent::FixedValueProductAddedToContract(data)
            | ContractEvent::VariableValueProductAddedToContract(data) => {
                details.products.push(ContractProduct {
                    product_id: data.product_id,
                    name: data.product_name,
                    display_text: data.display_text,
                    value: data.value,
                    fees: Vec::new(),
                });
            }
            ContractEvent::TransactionFeeAddedToProduct(data) => {
                if let Some(product) = details.product_mut(data.product_id) {
                    product.fees.push(ProductFee {
                        fee_id: data.fee_id,
                        description: data.description,
                        calculation_type: data.calculation_type,
                        fee_type: data.fee_type,
                        value: data.value,
                        is_enabled: true,
                    });
                }
            }
            ContractEvent::TransactionFeeForProductDisabled(data) => {
                if let Some(fee) = details
                    .product_mut(data.product_id)
                    .and_then(|p| p.fees.iter_mut().find(|f| f.fee_id == data.fee_id))
                {
                    fee.is_enabled = false;
                }
            }
        }
    }
}

impl ContractDetails {
    fn product_mut(&mut self, product_id: ProductId) -> Option<&mut ContractProduct> {
        self.products.iter_mut().find(|p| p.product_id == product_id)
    }
}

// Query methods
impl Contract {
    pub fn details(&self) -> Option<&ContractDetails> {
        self.state.get()
    }

    pub fn product(&self, product_id: ProductId) -> Option<&ContractProduct> {
        self.details()?
            .products
            .iter()
            .find(|p| p.product_id == product_id)
    }

    /// Enabled fees of a product in definition order, or None if the product
    /// does not exist.
    pub fn fees_for_product(&self, product_id: ProductId) -> Option<Vec<TransactionFeeToCalculate>> {
        let product = self.product(product_id)?;
        Some(
            product
                .fees
                .iter()
                .filter(|f| f.is_enabled)
                .map(ProductFee::to_calculate)
                .collect(),
        )
    }

    /// Looks up a fee definition whether or not it is still enabled.
    pub fn fee(&self, product_id: ProductId, fee_id: FeeId) -> Option<&ProductFee> {
        self.product(product_id)?
            .fees
            .iter()
            .find(|f| f.fee_id == fee_id)
    }

    fn require_created(&self) -> Result<&ContractDetails, ContractError> {
        self.details().ok_or(ContractError::NotCreated)
    }
}

// Command methods (return events)
impl Contract {
    pub fn create(
        &self,
        contract_id: AggregateId,
        estate_id: AggregateId,
        operator_id: AggregateId,
        description: impl Into<String>,
    ) -> Result<Vec<ContractEvent>, ContractError> {
        if self.state.is_created() {
            return Err(ContractError::AlreadyCreated);
        }
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ContractError::DescriptionRequired);
        }

        Ok(vec![ContractEvent::ContractCreated(ContractCreatedData {
            contract_id,
            estate_id,
            operator_id,
            description,
        })])
    }

    /// Adds a product. A `value` makes it a fixed value product.
    pub fn add_product(
        &self,
        product_id: ProductId,
        name: impl Into<String>,
        display_text: impl Into<String>,
        value: Option<Decimal>,
    ) -> Result<Vec<ContractEvent>, ContractError> {
        let details = self.require_created()?;
        let name = name.into();
        if details.products.iter().any(|p| p.name == name) {
            return Err(ContractError::DuplicateProduct(name));
        }

        let data = ProductAddedData {
            contract_id: details.contract_id,
            estate_id: details.estate_id,
            product_id,
            product_name: name,
            display_text: display_text.into(),
            value,
        };
        Ok(vec![match value {
            Some(_) => ContractEvent::FixedValueProductAddedToContract(data),
            None => ContractEvent::VariableValueProductAddedToContract(data),
        }])
    }

    pub fn add_transaction_fee(
        &self,
        product_id: ProductId,
        fee_id: FeeId,
        description: impl Into<String>,
        calculation_type: CalculationType,
        fee_type: FeeType,
        value: Decimal,
    ) -> Result<Vec<ContractEvent>, ContractError> {
        let details = self.require_created()?;
        let product = self
            .product(product_id)
            .ok_or(ContractError::ProductNotFound { product_id })?;
        if value <= Decimal::ZERO {
            return Err(ContractError::InvalidFeeValue(value));
        }
        if product.fees.iter().any(|f| f.fee_id == fee_id) {
            return Ok(vec![]);
        }

        Ok(vec![ContractEvent::TransactionFeeAddedToProduct(
            TransactionFeeAddedToProductData {
                contract_id: details.contract_id,
                estate_id: details.estate_id,
                product_id,
                fee_id,
                description: description.into(),
                calculation_type,
                fee_type,
                value,
            },
        )])
    }

    pub fn disable_transaction_fee(
        &self,
        product_id: ProductId,
        fee_id: FeeId,
    ) -> Result<Vec<ContractEvent>, ContractError> {
        let details = self.require_created()?;
        let fee = self
            .fee(product_id, fee_id)
            .ok_or(ContractError::FeeNotFound { product_id, fee_id })?;
        if !fee.is_enabled {
            return Ok(vec![]);
        }

        Ok(vec![ContractEvent::TransactionFeeForProductDisabled(
            TransactionFeeForProductDisabledData {
                contract_id: details.contract_id,
                estate_id: details.estate_id,
                product_id,
                fee_id,
            },
        )])
    }
}
