//! Voucher aggregate: a prepaid code sold through a transaction.

mod aggregate;
mod events;

pub use aggregate::{Voucher, VoucherDetails};
pub use events::{VoucherEvent, VoucherFullyRedeemedData, VoucherGeneratedData, VoucherIssuedData};

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during voucher commands.
#[derive(Debug, Error)]
pub enum VoucherError {
    #[error("Voucher has not been generated")]
    NotCreated,

    #[error("Voucher already generated")]
    AlreadyCreated,

    #[error("Voucher value must be positive, got {0}")]
    InvalidValue(Decimal),

    #[error("Voucher code is required")]
    CodeRequired,

    #[error("Either a recipient email or mobile number is required")]
    RecipientRequired,

    #[error("Voucher has already been issued")]
    AlreadyIssued,

    #[error("Voucher has not been issued")]
    NotIssued,

    #[error("Voucher has already been redeemed")]
    AlreadyRedeemed,

    #[error("Voucher expired")]
    Expired,
}
