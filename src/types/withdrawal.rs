//! Withdrawal request types
//!
//! A request is only ever created after its amount has been debited from the
//! user's balance, so a pending request represents reserved funds.

use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential withdrawal request identifier
pub type WithdrawalId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    /// Funds reserved, waiting for external payout
    Pending,
    /// Paid out externally
    Processed,
    /// Refused; the reserved amount went back to the balance
    Rejected,
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalStatus::Pending => f.write_str("pending"),
            WithdrawalStatus::Processed => f.write_str("processed"),
            WithdrawalStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// A user-initiated payout request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub user_id: UserId,
    pub requested_amount: Decimal,
    pub payout_destination: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}
