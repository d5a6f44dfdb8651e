//! Settlement state machine.

use serde::{Deserialize, Serialize};

/// The state of a settlement header.
///
/// State transitions:
/// ```text
/// Pending ──► ProcessingStarted ──► Completed
/// ```
/// Fee lines carry their own `is_settled` flag independent of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SettlementStatus {
    /// Created on the first qualifying transaction; fee lines accumulate.
    #[default]
    Pending,

    /// Processing has been triggered; no second trigger may transition again.
    ProcessingStarted,

    /// All qualifying fee lines identified (terminal).
    Completed,
}

impl SettlementStatus {
    pub fn can_add_fees(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_start_processing(&self) -> bool {
        matches!(self, SettlementStatus::Pending)
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, SettlementStatus::ProcessingStarted)
    }

    /// Payouts are recorded once processing has begun.
    pub fn can_settle_fees(&self) -> bool {
        matches!(
            self,
            SettlementStatus::ProcessingStarted | SettlementStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SettlementStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementStatus::Pending => "Pending",
            SettlementStatus::ProcessingStarted => "ProcessingStarted",
            SettlementStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
