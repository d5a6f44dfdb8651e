//! Read models for the settlement core.
//!
//! - [`Projection`] folds events from the global feed into a read model
//! - [`ProjectionProcessor`] runs catch-up and rebuilds on demand
//! - [`ProjectionWorkers`] tails the feed in the background, one task per
//!   projection family
//! - Four views: catalog, transactions, settlements and merchant balances
//!
//! Delivery is at-least-once. Each view records the events it has applied in
//! a processed-events ledger and writes its rows with keyed inserts, so a
//! replayed event changes nothing.

pub mod error;
pub mod processor;
pub mod projection;
pub mod store;
pub mod views;
pub mod worker;

pub use error::{ProjectionError, Result};
pub use processor::{BatchOutcome, ProjectionProcessor, catch_up, deliver_batch};
pub use projection::{Applied, Projection, ProjectionPosition};
pub use store::{EventLedger, Table, WriterConfig};
pub use views::{
    BalanceChangeType, CatalogView, ContractProductSummary, ContractSummary, EstateOperatorEntry,
    EstateSummary, MerchantBalanceChangedEntry, MerchantBalanceProjectionState,
    MerchantBalanceView, MerchantOperatorEntry, MerchantSettlementFee, MerchantSummary,
    OperatorSummary, ReadModels, SettlementSummary, SettlementView, TransactionSummary,
    TransactionView, VoucherCodeEntry,
};
pub use worker::{ProjectionWorkers, WorkerConfig, WorkerHandles};
