//! Operator aggregate: a service provider whose products merchants sell.

mod aggregate;
mod events;

pub use aggregate::{Operator, OperatorDetails};
pub use events::{
    OperatorCreatedData, OperatorEvent, OperatorNameUpdatedData, OperatorRequirementsChangedData,
};

use thiserror::Error;

/// Errors that can occur during operator commands.
#[derive(Debug, Error)]
pub enum OperatorError {
    #[error("Operator has not been created")]
    NotCreated,

    #[error("Operator already created")]
    AlreadyCreated,

    #[error("Operator name is required")]
    NameRequired,
}
