//! Response models returned by the query façade.

use common::AggregateId;
use domain::estate::SecurityUser;
use domain::merchant::MerchantDetails;
use projections::{MerchantSettlementFee, SettlementSummary};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstateOperatorResponse {
    pub operator_id: AggregateId,
    pub name: String,
    pub is_deleted: bool,
    pub require_custom_merchant_number: bool,
    pub require_custom_terminal_number: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstateResponse {
    pub estate_id: AggregateId,
    pub name: String,
    pub reference: Option<String>,
    /// In assignment order, removed operators included.
    pub operators: Vec<EstateOperatorResponse>,
    pub security_users: Vec<SecurityUser>,
}

/// A merchant from its own stream, with balances from the read model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantResponse {
    #[serde(flatten)]
    pub merchant: MerchantDetails,
    /// Zero until the balance projection has seen the merchant.
    pub balance: Decimal,
    pub available_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResponse {
    #[serde(flatten)]
    pub settlement: SettlementSummary,
    pub fees: Vec<MerchantSettlementFee>,
}
