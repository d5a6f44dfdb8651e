//! Read model views, one per projection family.

pub mod balance;
pub mod catalog;
pub mod settlement;
pub mod transaction;

pub use balance::{
    BalanceChangeType, MerchantBalanceChangedEntry, MerchantBalanceProjectionState,
    MerchantBalanceView,
};
pub use catalog::{
    CatalogView, ContractProductSummary, ContractSummary, EstateOperatorEntry, EstateSummary,
    MerchantOperatorEntry, MerchantSummary, OperatorSummary, VoucherCodeEntry,
};
pub use settlement::{MerchantSettlementFee, SettlementSummary, SettlementView};
pub use transaction::{TransactionSummary, TransactionView};

use std::sync::Arc;

use domain::DomainEvent;
use event_store::EventEnvelope;

use crate::Result;
use crate::projection::Projection;
use crate::store::WriterConfig;

/// The four projection families, built with one writer configuration.
#[derive(Clone)]
pub struct ReadModels {
    pub catalog: CatalogView,
    pub transactions: TransactionView,
    pub settlements: SettlementView,
    pub balances: MerchantBalanceView,
}

impl ReadModels {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            catalog: CatalogView::new(config.clone()),
            transactions: TransactionView::new(config.clone()),
            settlements: SettlementView::new(config.clone()),
            balances: MerchantBalanceView::new(config),
        }
    }

    /// Handles to every family, for registering with a processor or workers.
    pub fn families(&self) -> Vec<Arc<dyn Projection>> {
        let catalog: Arc<dyn Projection> = Arc::new(self.catalog.clone());
        let transactions: Arc<dyn Projection> = Arc::new(self.transactions.clone());
        let settlements: Arc<dyn Projection> = Arc::new(self.settlements.clone());
        let balances: Arc<dyn Projection> = Arc::new(self.balances.clone());
        vec![catalog, transactions, settlements, balances]
    }
}

impl Default for ReadModels {
    fn default() -> Self {
        Self::new(WriterConfig::default())
    }
}

/// Decodes an envelope whose type `E` knows; other types yield None.
pub(crate) fn decode_known<E: DomainEvent>(event: &EventEnvelope) -> Result<Option<E>> {
    if !E::is_known(&event.event_type) {
        return Ok(None);
    }
    Ok(Some(event.decode()?))
}
