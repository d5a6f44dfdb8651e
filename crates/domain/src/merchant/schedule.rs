use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// How often a merchant's fees are settled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementSchedule {
    #[default]
    Immediate,
    Weekly,
    Monthly,
}

impl SettlementSchedule {
    /// Returns the settlement date for a transaction made on `transaction_date`.
    pub fn settlement_date_for(&self, transaction_date: NaiveDate) -> NaiveDate {
        match self {
            SettlementSchedule::Immediate => transaction_date,
            SettlementSchedule::Weekly => transaction_date + chrono::Duration::days(7),
            SettlementSchedule::Monthly => transaction_date
                .checked_add_months(Months::new(1))
                .unwrap_or(transaction_date),
        }
    }
}
