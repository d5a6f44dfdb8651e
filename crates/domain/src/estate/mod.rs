//! Estate aggregate: the tenant that owns operators and merchants.

mod aggregate;
mod events;

pub use aggregate::{Estate, EstateDetails, EstateOperator, SecurityUser};
pub use events::{
    EstateCreatedData, EstateEvent, EstateReferenceAllocatedData, OperatorAssignedToEstateData,
    OperatorRemovedFromEstateData, SecurityUserAddedToEstateData,
};

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during estate commands.
#[derive(Debug, Error)]
pub enum EstateError {
    #[error("Estate has not been created")]
    NotCreated,

    #[error("Estate already created")]
    AlreadyCreated,

    #[error("Estate name is required")]
    NameRequired,

    #[error("Estate reference already allocated")]
    ReferenceAlreadyAllocated,

    #[error("Operator {operator_id} is already assigned to the estate")]
    OperatorAlreadyAssigned { operator_id: AggregateId },

    #[error("Operator {operator_id} is not assigned to the estate")]
    OperatorNotAssigned { operator_id: AggregateId },
}
