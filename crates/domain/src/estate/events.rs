//! Estate domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{DomainEvent, HasEstateId};

/// Events that can occur on an estate aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EstateEvent {
    EstateCreated(EstateCreatedData),
    EstateReferenceAllocated(EstateReferenceAllocatedData),
    OperatorAssignedToEstate(OperatorAssignedToEstateData),
    /// Soft delete: the operator stays listed with `is_deleted` set.
    OperatorRemovedFromEstate(OperatorRemovedFromEstateData),
    SecurityUserAddedToEstate(SecurityUserAddedToEstateData),
}

impl DomainEvent for EstateEvent {
    const EVENT_TYPES: &'static [&'static str] = &[
        "EstateCreated",
        "EstateReferenceAllocated",
        "OperatorAssignedToEstate",
        "OperatorRemovedFromEstate",
        "SecurityUserAddedToEstate",
    ];

    fn event_type(&self) -> &'static str {
        match self {
            EstateEvent::EstateCreated(_) => "EstateCreated",
            EstateEvent::EstateReferenceAllocated(_) => "EstateReferenceAllocated",
            EstateEvent::OperatorAssignedToEstate(_) => "OperatorAssignedToEstate",
            EstateEvent::OperatorRemovedFromEstate(_) => "OperatorRemovedFromEstate",
            EstateEvent::SecurityUserAddedToEstate(_) => "SecurityUserAddedToEstate",
        }
    }
}

impl HasEstateId for EstateEvent {
    fn estate_id(&self) -> Option<AggregateId> {
        Some(match self {
            EstateEvent::EstateCreated(data) => data.estate_id,
            EstateEvent::EstateReferenceAllocated(data) => data.estate_id,
            EstateEvent::OperatorAssignedToEstate(data) => data.estate_id,
            EstateEvent::OperatorRemovedFromEstate(data) => data.estate_id,
            EstateEvent::SecurityUserAddedToEstate(data) => data.estate_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstateCreatedData {
    pub estate_id: AggregateId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstateReferenceAllocatedData {
    pub estate_id: AggregateId,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorAssignedToEstateData {
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
    /// Operator name at assignment time.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRemovedFromEstateData {
    pub estate_id: AggregateId,
    pub operator_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityUserAddedToEstateData {
    pub estate_id: AggregateId,
    pub security_user_id: Uuid,
    pub email: String,
}

impl EstateEvent {
    pub fn estate_created(estate_id: AggregateId, name: impl Into<String>) -> Self {
        EstateEvent::EstateCreated(EstateCreatedData {
            estate_id,
            name: name.into(),
            created_at: Utc::now(),
        })
    }

    pub fn operator_assigned(
        estate_id: AggregateId,
        operator_id: AggregateId,
        name: impl Into<String>,
    ) -> Self {
        EstateEvent::OperatorAssignedToEstate(OperatorAssignedToEstateData {
            estate_id,
            operator_id,
            name: name.into(),
        })
    }

    pub fn operator_removed(estate_id: AggregateId, operator_id: AggregateId) -> Self {
        EstateEvent::OperatorRemovedFromEstate(OperatorRemovedFromEstateData {
            estate_id,
            operator_id,
        })
    }
}
