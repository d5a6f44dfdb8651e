//! Estate aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{Aggregate, Lifecycle};

use super::{
    EstateError, EstateEvent,
    events::{EstateReferenceAllocatedData, SecurityUserAddedToEstateData},
};

/// Estate aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Estate {
    #[serde(default)]
    version: Version,
    state: Lifecycle<EstateDetails>,
}

/// State of a created estate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstateDetails {
    pub estate_id: AggregateId,
    pub name: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    /// In assignment order. Removed operators stay with `is_deleted` set.
    pub operators: Vec<EstateOperator>,
    pub security_users: Vec<SecurityUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstateOperator {
    pub operator_id: AggregateId,
    pub name: String,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityUser {
    pub security_user_id: Uuid,
    pub email: String,
}

impl Aggregate for Estate {
    type Event = EstateEvent;
    type Error = EstateError;

    fn aggregate_type() -> &'static str {
        "Estate"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.estate_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        if let EstateEvent::EstateCreated(data) = event {
            self.state = Lifecycle::Created(EstateDetails {
                estate_id: data.estate_id,
                name: data.name,
                reference: None,
                created_at: data.created_at,
                operators: Vec::new(),
                security_users: Vec::new(),
            });
            return;
        }

        let Some(details) = self.state.get_mut() else {
            return;
        };

        match event {
            EstateEvent::EstateCreated(_) => {}
            EstateEvent::EstateReferenceAllocated(data) => {
                details.reference = Some(data.reference);
            }
            EstateEvent::OperatorAssignedToEstate(data) => {
                match details
                    .operators
                    .iter_mut()
                    .find(|o| o.operator_id == data.operator_id)
                {
                    Some(existing) => {
                        existing.name = data.name;
                        existing.is_deleted = false;
                    }
                    None => details.operators.push(EstateOperator {
                        operator_id: data.operator_id,
                        name: data.name,
                        is_deleted: false,
                    }),
                }
            }
            EstateEvent::OperatorRemovedFromEstate(data) => {
                if let Some(existing) = details
                    .operators
                    .iter_mut()
                    .find(|o| o.operator_id == data.operator_id)
                {
                    existing.is_deleted = true;
                }
            }
            EstateEvent::SecurityUserAddedToEstate(data) => {
                details.security_users.push(SecurityUser {
                    security_user_id: data.security_user_id,
                    email: data.email,
                });
            }
        }
    }
}

// Query methods
impl Estate {
    pub fn details(&self) -> Option<&EstateDetails> {
        self.state.get()
    }

    pub fn name(&self) -> Option<&str> {
        self.details().map(|d| d.name.as_str())
    }

    /// Operators that have not been removed.
    pub fn active_operators(&self) -> impl Iterator<Item = &EstateOperator> {
        self.details()
            .into_iter()
            .flat_map(|d| d.operators.iter())
            .filter(|o| !o.is_deleted)
    }

    fn require_created(&self) -> Result<&EstateDetails, EstateError> {
        self.details().ok_or(EstateError::NotCreated)
    }
}

// Command methods (return events)
impl Estate {
    pub fn create(
        &self,
        estate_id: AggregateId,
        name: impl Into<String>,
    ) -> Result<Vec<EstateEvent>, EstateError> {
        if self.state.is_created() {
            return Err(EstateError::AlreadyCreated);
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EstateError::NameRequired);
        }

        Ok(vec![EstateEvent::estate_created(estate_id, name)])
    }

    /// Allocating the same reference twice is a no-op.
    pub fn allocate_reference(
        &self,
        reference: impl Into<String>,
    ) -> Result<Vec<EstateEvent>, EstateError> {
        let details = self.require_created()?;
        let reference = reference.into();

        match &details.reference {
            Some(existing) if *existing == reference => Ok(vec![]),
            Some(_) => Err(EstateError::ReferenceAlreadyAllocated),
            None => Ok(vec![EstateEvent::EstateReferenceAllocated(
                EstateReferenceAllocatedData {
                    estate_id: details.estate_id,
                    reference,
                },
            )]),
        }
    }

    pub fn assign_operator(
        &self,
        operator_id: AggregateId,
        name: impl Into<String>,
    ) -> Result<Vec<EstateEvent>, EstateError> {
        let details = self.require_created()?;
        if self.active_operators().any(|o| o.operator_id == operator_id) {
            return Err(EstateError::OperatorAlreadyAssigned { operator_id });
        }

        Ok(vec![EstateEvent::operator_assigned(
            details.estate_id,
            operator_id,
            name,
        )])
    }

    pub fn remove_operator(
        &self,
        operator_id: AggregateId,
    ) -> Result<Vec<EstateEvent>, EstateError> {
        let details = self.require_created()?;
        let operator = details
            .operators
            .iter()
            .find(|o| o.operator_id == operator_id)
            .ok_or(EstateError::OperatorNotAssigned { operator_id })?;

        if operator.is_deleted {
            return Ok(vec![]);
        }
        Ok(vec![EstateEvent::operator_removed(
            details.estate_id,
            operator_id,
        )])
    }

    pub fn add_security_user(
        &self,
        security_user_id: Uuid,
        email: impl Into<String>,
    ) -> Result<Vec<EstateEvent>, EstateError> {
        let details = self.require_created()?;
        if details
            .security_users
            .iter()
            .any(|u| u.security_user_id == security_user_id)
        {
            return Ok(vec![]);
        }

        Ok(vec![EstateEvent::SecurityUserAddedToEstate(
            SecurityUserAddedToEstateData {
                estate_id: details.estate_id,
                security_user_id,
                email: email.into(),
            },
        )])
    }
}
