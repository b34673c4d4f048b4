//! Ledger journal types
//!
//! Every balance mutation appends exactly one [`LedgerEntry`] naming the event
//! that caused it. Summing the entries of a user reproduces their balance.

use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of event behind a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryCause {
    /// Buyer debited when paying a deal
    DealPayment,
    /// Seller credited when the buyer confirms receipt
    DealPayout,
    /// Buyer credited back when a paid deal is cancelled
    DealRefund,
    /// Admin credited a test balance
    AdminGrant,
    /// Admin raised a balance to the unlimited sentinel
    AdminUnlimited,
    /// User debited when requesting a withdrawal
    Withdrawal,
    /// User credited back when a withdrawal is rejected
    WithdrawalRefund,
}

/// Cause of a balance mutation: what happened and to which record
///
/// `reference` is the deal id, withdrawal id or acting admin id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cause {
    pub kind: EntryCause,
    pub reference: String,
}

impl Cause {
    pub fn new(kind: EntryCause, reference: impl ToString) -> Self {
        Cause {
            kind,
            reference: reference.to_string(),
        }
    }

    pub fn deal_payment(deal_id: &str) -> Self {
        Cause::new(EntryCause::DealPayment, deal_id)
    }

    pub fn deal_payout(deal_id: &str) -> Self {
        Cause::new(EntryCause::DealPayout, deal_id)
    }

    pub fn deal_refund(deal_id: &str) -> Self {
        Cause::new(EntryCause::DealRefund, deal_id)
    }
}

/// One line of the balance journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonic sequence number, unique across the journal
    pub seq: u64,
    pub user_id: UserId,
    /// Signed change applied to the balance
    pub delta: Decimal,
    pub cause: EntryCause,
    pub reference: String,
    pub recorded_at: DateTime<Utc>,
}
