//! Runtime configuration for the escrow core
//!
//! Nothing here is hardcoded into the core: the admin allowlist, the withdrawal
//! floor and the link prefix are all injected by the caller (the CLI fills
//! them from flags or environment variables).

use crate::types::UserId;
use rust_decimal::Decimal;
use tracing::warn;

/// Configuration for the escrow service
#[derive(Clone, Debug, PartialEq)]
pub struct EscrowConfig {
    /// Smallest amount a user may withdraw
    pub min_withdrawal: Decimal,
    /// Balance granted by the "unlimited" admin operation
    pub unlimited_balance: Decimal,
    /// Bot handle used to build shareable deal links
    pub bot_username: String,
    /// Users allowed to run admin operations
    pub admin_ids: Vec<UserId>,
    /// How many fresh deal ids to try before giving up on a collision streak
    pub max_id_attempts: u32,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            min_withdrawal: Decimal::new(10_000, 0),
            unlimited_balance: Decimal::new(999_999, 0),
            bot_username: "escrow_bot".to_string(),
            admin_ids: Vec::new(),
            max_id_attempts: 8,
        }
    }
}

impl EscrowConfig {
    /// Create a config, falling back to defaults for unusable values
    pub fn new(
        min_withdrawal: Decimal,
        unlimited_balance: Decimal,
        bot_username: String,
        admin_ids: Vec<UserId>,
    ) -> Self {
        let default = Self::default();

        let min_withdrawal = if min_withdrawal <= Decimal::ZERO {
            warn!(
                %min_withdrawal,
                fallback = %default.min_withdrawal,
                "Invalid min_withdrawal, using default"
            );
            default.min_withdrawal
        } else {
            min_withdrawal
        };

        let unlimited_balance = if unlimited_balance <= Decimal::ZERO {
            warn!(
                %unlimited_balance,
                fallback = %default.unlimited_balance,
                "Invalid unlimited_balance, using default"
            );
            default.unlimited_balance
        } else {
            unlimited_balance
        };

        let bot_username = match bot_username.trim().trim_start_matches('@') {
            "" => default.bot_username,
            name => name.to_string(),
        };

        Self {
            min_withdrawal,
            unlimited_balance,
            bot_username,
            admin_ids,
            max_id_attempts: default.max_id_attempts,
        }
    }

    /// Shareable link a buyer opens to join `deal_id`
    pub fn deal_link(&self, deal_id: &str) -> String {
        format!("https://t.me/{}?start=deal_{}", self.bot_username, deal_id)
    }
}
