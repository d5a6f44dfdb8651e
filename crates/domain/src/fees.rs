//! Transaction fee calculation.
//!
//! Pure and synchronous: no I/O, no clock reads beyond the optional default
//! timestamp. The output is positionally aligned with the input, which the
//! settlement reconciliation relies on.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::value_objects::FeeId;

/// Decimal places kept on percentage fee results.
pub const FEE_RESULT_SCALE: u32 = 2;

/// How a fee's value turns into an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationType {
    /// The value is the fee amount.
    Fixed,
    /// The value is a percentage of the transaction amount.
    Percentage,
}

/// Who the fee is attributed to. Does not affect the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeType {
    Merchant,
    ServiceProvider,
}

/// A fee definition to be applied to one transaction amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeeToCalculate {
    pub fee_id: FeeId,
    pub calculation_type: CalculationType,
    pub fee_type: FeeType,
    pub value: Decimal,
}

/// The result of applying one fee definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedFee {
    pub fee_id: FeeId,
    pub fee_type: FeeType,
    pub calculation_type: CalculationType,
    /// The definition's value (amount or percentage).
    pub fee_value: Decimal,
    pub calculated_value: Decimal,
    pub calculated_at: DateTime<Utc>,
}

/// Stateless fee calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeCalculationEngine;

impl FeeCalculationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Calculates every fee against `transaction_amount`.
    ///
    /// Returns exactly one [`CalculatedFee`] per input, in input order.
    /// `calculated_at` defaults to now and is metadata only.
    pub fn calculate_fees(
        &self,
        fees: &[TransactionFeeToCalculate],
        transaction_amount: Decimal,
        calculated_at: Option<DateTime<Utc>>,
    ) -> Vec<CalculatedFee> {
        let calculated_at = calculated_at.unwrap_or_else(Utc::now);

        fees.iter()
            .map(|fee| CalculatedFee {
                fee_id: fee.fee_id,
                fee_type: fee.fee_type,
                calculation_type: fee.calculation_type,
                fee_value: fee.value,
                calculated_value: calculate_value(fee, transaction_amount),
                calculated_at,
            })
            .collect()
    }
}

fn calculate_value(fee: &TransactionFeeToCalculate, transaction_amount: Decimal) -> Decimal {
    match fee.calculation_type {
        CalculationType::Fixed => fee.value,
        CalculationType::Percentage => percentage_of(transaction_amount, fee.value),
    }
}

/// `amount * percent / 100`, rounded to [`FEE_RESULT_SCALE`] places with
/// midpoints rounded away from zero.
pub fn percentage_of(amount: Decimal, percent: Decimal) -> Decimal {
    (amount * percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(FEE_RESULT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
