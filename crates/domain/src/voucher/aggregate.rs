use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, Lifecycle};

use super::{
    VoucherError, VoucherEvent,
    events::{VoucherFullyRedeemedData, VoucherGeneratedData, VoucherIssuedData},
};

/// Voucher aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(default)]
    version: Version,
    state: Lifecycle<VoucherDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherDetails {
    pub voucher_id: AggregateId,
    pub estate_id: AggregateId,
    pub transaction_id: AggregateId,
    pub voucher_code: String,
    pub value: Decimal,
    pub balance: Decimal,
    pub expiry_date: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub recipient_email: Option<String>,
    pub recipient_mobile: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl VoucherDetails {
    pub fn is_issued(&self) -> bool {
        self.issued_at.is_some()
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }
}

impl Aggregate for Voucher {
    type Event = VoucherEvent;
    type Error = VoucherError;

    fn aggregate_type() -> &'static str {
        "Voucher"
    }

    fn id(&self) -> Option<AggregateId> {
        self.state.get().map(|d| d.voucher_id)
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            VoucherEvent::VoucherGenerated(data) => {
                self.state = Lifecycle::Created(VoucherDetails {
                    voucher_id: data.voucher_id,
                    estate_id: data.estate_id,
                    transaction_id: data.transaction_id,
                    voucher_code: data.voucher_code,
                    value: data.value,
                    balance: data.value,
                    expiry_date: data.expiry_date,
                    generated_at: data.generated_at,
                    recipient_email: None,
                    recipient_mobile: None,
                    issued_at: None,
                    redeemed_at: None,
                });
            }
            VoucherEvent::VoucherIssued(data) => {
                if let Some(details) = self.state.get_mut() {
                    details.recipient_email = data.recipient_email;
                    details.recipient_mobile = data.recipient_mobile;
                    details.issued_at = Some(data.issued_at);
                }
            }
            VoucherEvent::VoucherFullyRedeemed(data) => {
                if let Some(details) = self.state.get_mut() {
                    details.balance = Decimal::ZERO;
                    details.redeemed_at = Some(data.redeemed_at);
                }
            }
        }
    }
}

impl Voucher {
    pub fn details(&self) -> Option<&VoucherDetails> {
        self.state.get()
    }

    pub fn balance(&self) -> Decimal {
        self.details().map(|d| d.balance).unwrap_or_default()
    }

    pub fn generate(
        &self,
        data: VoucherGeneratedData,
    ) -> Result<Vec<VoucherEvent>, VoucherError> {
        if self.state.is_created() {
            return Err(VoucherError::AlreadyCreated);
        }
        if data.value <= Decimal::ZERO {
            return Err(VoucherError::InvalidValue(data.value));
        }
        if data.voucher_code.trim().is_empty() {
            return Err(VoucherError::CodeRequired);
        }

        Ok(vec![VoucherEvent::VoucherGenerated(data)])
    }

    pub fn issue(
        &self,
        recipient_email: Option<String>,
        recipient_mobile: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Result<Vec<VoucherEvent>, VoucherError> {
        let details = self.details().ok_or(VoucherError::NotCreated)?;
        if recipient_email.is_none() && recipient_mobile.is_none() {
            return Err(VoucherError::RecipientRequired);
        }
        if details.is_issued() {
            return Err(VoucherError::AlreadyIssued);
        }

        Ok(vec![VoucherEvent::VoucherIssued(VoucherIssuedData {
            voucher_id: details.voucher_id,
            estate_id: details.estate_id,
            recipient_email,
            recipient_mobile,
            issued_at,
        })])
    }

    pub fn redeem(&self, redeemed_at: DateTime<Utc>) -> Result<Vec<VoucherEvent>, VoucherError> {
        let details = self.details().ok_or(VoucherError::NotCreated)?;
        if !details.is_issued() {
            return Err(VoucherError::NotIssued);
        }
        if details.is_redeemed() {
            return Err(VoucherError::AlreadyRedeemed);
        }
        if redeemed_at > details.expiry_date {
            return Err(VoucherError::Expired);
        }

        Ok(vec![VoucherEvent::VoucherFullyRedeemed(
            VoucherFullyRedeemedData {
                voucher_id: details.voucher_id,
                estate_id: details.estate_id,
                redeemed_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn generated_voucher() -> Voucher {
        let now = Utc::now();
        let mut voucher = Voucher::default();
        let events = voucher
            .generate(VoucherGeneratedData {
                voucher_id: AggregateId::new(),
                estate_id: AggregateId::new(),
                transaction_id: AggregateId::new(),
                voucher_code: "ABC123".to_string(),
                value: dec!(20.00),
                expiry_date: now + Duration::days(30),
                generated_at: now,
            })
            .unwrap();
        voucher.apply_events(events);
        voucher
    }

    #[test]
    fn balance_is_value_until_redeemed() {
        let mut voucher = generated_voucher();
        assert_eq!(voucher.balance(), dec!(20.00));

        voucher.apply_events(
            voucher
                .issue(None, Some("07777777777".into()), Utc::now())
                .unwrap(),
        );
        assert_eq!(voucher.balance(), dec!(20.00));

        voucher.apply_events(voucher.redeem(Utc::now()).unwrap());
        assert_eq!(voucher.balance(), Decimal::ZERO);
        assert!(matches!(
            voucher.redeem(Utc::now()),
            Err(VoucherError::AlreadyRedeemed)
        ));
    }

    #[test]
    fn issue_requires_recipient() {
        let voucher = generated_voucher();
        assert!(matches!(
            voucher.issue(None, None, Utc::now()),
            Err(VoucherError::RecipientRequired)
        ));
    }

    #[test]
    fn redeem_requires_issue_and_validity() {
        let mut voucher = generated_voucher();
        assert!(matches!(
            voucher.redeem(Utc::now()),
            Err(VoucherError::NotIssued)
        ));

        voucher.apply_events(
            voucher
                .issue(Some("a@b.test".into()), None, Utc::now())
                .unwrap(),
        );
        assert!(matches!(
            voucher.redeem(Utc::now() + Duration::days(31)),
            Err(VoucherError::Expired)
        ));
    }
}
