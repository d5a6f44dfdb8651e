//! Identifier types shared by every layer of the settlement core.

mod types;

pub use types::AggregateId;
