//! Settlement engine for the estate settlement core.
//!
//! Reconciles merchant transaction fees into per-date settlements and drives
//! each settlement through its lifecycle. Fee lines are keyed by
//! (transaction, fee) so repeated runs never attribute a fee twice.

pub mod engine;
pub mod error;
pub mod report;

pub use engine::SettlementEngine;
pub use error::{Result, SettlementError};
pub use report::{
    AttributionFailure, DueSettlement, ProcessingOutcome, SettlementReport, SettlementRun,
};
