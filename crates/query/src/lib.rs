//! Read side of the settlement core.
//!
//! [`QueryManager`] answers single-entity reads from the entity's own event
//! stream and list reads from the projection read models. Every method
//! returns a [`QueryError`] that keeps "not created", "empty list" and
//! "store failed" apart.

pub mod error;
pub mod manager;
pub mod models;

pub use error::{QueryError, Result};
pub use manager::QueryManager;
pub use models::{EstateOperatorResponse, EstateResponse, MerchantResponse, SettlementResponse};
