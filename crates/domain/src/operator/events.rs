//! Operator domain events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::{DomainEvent, HasEstateId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OperatorEvent {
    OperatorCreated(OperatorCreatedData),
    OperatorNameUpdated(OperatorNameUpdatedData),
    OperatorRequirementsChanged(OperatorRequirementsChangedData),
}

impl DomainEvent for OperatorEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "OperatorCreated",
        "OperatorNameUpdated",
        "OperatorRequirementsChanged",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            OperatorEvent::OperatorCreated(_) => "OperatorCreated",
            OperatorEvent::OperatorNameUpdated(_) => "OperatorNameUpdated",
            OperatorEvent::OperatorRequirementsChanged(_) => "OperatorRequirementsChanged",
        }
    }
}

impl HasEstateId for OperatorEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(match self {
            OperatorEvent::OperatorCreated(data) => data.estate_id,
            OperatorEvent::OperatorNameUpdated(data) => data.estate_id,
            OperatorEvent::OperatorRequirementsChanged(data) => data.estate_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorCreatedData {
    pub operator_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
    pub require_custom_merchant_number: bool,
    pub require_custom_terminal_number: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorNameUpdatedData {
    pub operator_id: AggregateId,
    pub estate_id: AggregateId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRequirementsChangedData {
    pub operator_id: AggregateId,
    pub estate_id: AggregateId,
    pub require_custom_merchant_number: bool,
    pub require_custom_terminal_number: bool,
}
