use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle};

use super::{
    OperatorError, OperatorEvent,
    events::{OperatorCreatedData, OperatorNameUpdatedData, OperatorRequirementsChangedData},
};

/// Operator aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(default)]
    version: Version,
    state: Lifecycle<OperatorDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorDetails {
    pub operator_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub require_custom_merchant_number: bool,
    pub require_custom_terminal_number: bool,
}

impl Aggregate for Operator {
    type Event = OperatorEvent;
    type Error = OperatorError;

    fn aggregate_type() -> &'static str {
        "Operator"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.operator_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OperatorEvent::OperatorCreated(data) => {
                self.state = Lifecycle::Created(OperatorDetails {
                    operator_id: data.operator_id,
                    estate_id: data.estate_id,
                    name: data.name,
                    require_custom_merchant_number: data.require_custom_merchant_number,
                    require_custom_terminal_number: data.require_custom_terminal_number,
                });
            }
            OperatorEvent::OperatorNameUpdated(data) => {
                if let Some(details) = self.state.get_mut() {
                    details.name = data.name;
                }
            }
            OperatorEvent::OperatorRequirementsChanged(data) => {
                if let Some(details) = self.state.get_mut() {
                    details.require_custom_merchant_number = data.require_custom_merchant_number;
                    details.require_custom_terminal_number = data.require_custom_terminal_number;
                }
            }
        }
    }
}

impl Operator {
    pub fn details(&self) -> Option<&OperatorDetails> {
        self.state.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.details().map(|d| d.name.as_str())
    }

    pub fn create(
        &self,
        operator_id: AggregateId,
        estate_id: AggregateId,
        name: impl Into<String>,
        require_custom_merchant_number: bool,
        require_custom_terminal_number: bool,
    ) -> Result<Vec<OperatorEvent>, OperatorError> {
        if self.state.is_created() {
            return Err(OperatorError::AlreadyCreated);
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OperatorError::NameRequired);
        }

        Ok(vec![OperatorEvent::OperatorCreated(OperatorCreatedData {
            operator_id,
            estate_id,
            name,
            require_custom_merchant_number,
            require_custom_terminal_number,
        })])
    }

    pub fn update_name(&self, name: impl Into<String>) -> Result<Vec<OperatorEvent>, OperatorError> {
        let details = self.details().ok_or(OperatorError::NotCreated)?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OperatorError::NameRequired);
        }
        if name == details.name {
            return Ok(vec![]);
        }

        Ok(vec![OperatorEvent::OperatorNameUpdated(
            OperatorNameUpdatedData {
                operator_id: details.operator_id,
                estate_id: details.estate_id,
                name,
            },
        )])
    }

    pub fn change_requirements(
        &self,
        require_custom_merchant_number: bool,
        require_custom_terminal_number: bool,
    ) -> Result<Vec<OperatorEvent>, OperatorError> {
        let details = self.details().ok_or(OperatorError::NotCreated)?;
        if details.require_custom_merchant_number == require_custom_merchant_number
            && details.require_custom_terminal_number == require_custom_terminal_number
        {
            return Ok(vec![]);
        }

        Ok(vec![OperatorEvent::OperatorRequirementsChanged(
            OperatorRequirementsChangedData {
                operator_id: details.operator_id,
                estate_id: details.estate_id,
                require_custom_merchant_number,
                require_custom_terminal_number,
            },
        )])
    }
}
