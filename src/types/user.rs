//! User-related types for the escrow engine
//!
//! A user row is created on first interaction and never deleted. Its balance
//! is only ever changed through the [`Ledger`](crate::core::Ledger).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// External stable user identity (the chat platform's numeric id)
pub type UserId = i64;

/// A marketplace participant
///
/// The same user may be seller on some deals and buyer on others, but never
/// both on the same deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,

    /// Display handle, if the chat layer knows one
    pub username: Option<String>,

    /// Spendable balance, never negative
    pub balance: Decimal,

    /// Number of deals completed as seller
    pub successful_deals: u32,

    pub is_banned: bool,

    /// Stored payout destination, used when a withdrawal names none
    pub requisites: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with zero balance, not banned
    pub fn new(user_id: UserId) -> Self {
        User {
            user_id,
            username: None,
            balance: Decimal::ZERO,
            successful_deals: 0,
            is_banned: false,
            requisites: None,
            created_at: Utc::now(),
        }
    }
}
