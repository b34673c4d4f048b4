//! Balance ledger
//!
//! The `Ledger` is the only component that mutates `User.balance`. Each
//! mutation is a check-and-write performed while holding the user's map entry,
//! so two concurrent debits on the same user can never both pass the
//! sufficiency check. Every mutation appends one journal entry naming its
//! cause before the entry lock is released.
//!
//! The ledger also owns the rest of the user row (ban flag, requisites,
//! successful deal counter) because those live on the same record.

use crate::types::{Cause, EntryCause, EscrowError, LedgerEntry, User, UserId};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Thread-safe user balance ledger
///
/// Lock order: a user entry is always taken before the journal mutex, and
/// the ledger never reaches into any other store while holding a user entry.
#[derive(Debug)]
pub struct Ledger {
    users: DashMap<UserId, User>,
    journal: Mutex<Vec<LedgerEntry>>,
    unlimited_balance: Decimal,
}

impl Ledger {
    /// Create an empty ledger
    ///
    /// `unlimited_balance` is the sentinel used by [`Ledger::grant_unlimited`].
    pub fn new(unlimited_balance: Decimal) -> Self {
        Self {
            users: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            unlimited_balance,
        }
    }

    /// Rebuild a ledger from persisted rows
    ///
    /// Fails if a user id appears twice or a balance is negative.
    pub fn restore(
        unlimited_balance: Decimal,
        users: Vec<User>,
        journal: Vec<LedgerEntry>,
    ) -> Result<Self, EscrowError> {
        let ledger = Self::new(unlimited_balance);

        for user in users {
            if user.balance < Decimal::ZERO {
                return Err(EscrowError::parse_error(
                    None,
                    format!("negative balance for user {}", user.user_id),
                ));
            }
            let user_id = user.user_id;
            if ledger.users.insert(user_id, user).is_some() {
                return Err(EscrowError::parse_error(
                    None,
                    format!("duplicate user id {}", user_id),
                ));
            }
        }

        let mut entries = journal;
        entries.sort_by_key(|entry| entry.seq);
        *ledger.journal.lock().unwrap_or_else(PoisonError::into_inner) = entries;

        Ok(ledger)
    }

    /// Idempotent upsert on first interaction
    ///
    /// An existing row is left untouched except that a missing username is
    /// filled in.
    pub fn register(&self, user_id: UserId, username: Option<&str>) -> User {
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id));

        if user.username.is_none() {
            user.username = username.map(str::to_string);
        }
        user.clone()
    }

    /// Snapshot of a user row
    pub fn get_user(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|user| user.clone())
    }

    /// Current balance; zero for users never seen
    pub fn balance(&self, user_id: UserId) -> Decimal {
        self.users
            .get(&user_id)
            .map(|user| user.balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_banned(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|user| user.is_banned)
    }

    /// Set or clear the ban flag, creating the row if needed
    pub fn set_banned(&self, user_id: UserId, banned: bool) -> User {
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id));
        user.is_banned = banned;
        user.clone()
    }

    /// Store the default payout destination; blank input clears it
    pub fn set_requisites(&self, user_id: UserId, requisites: &str) -> User {
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id));

        let trimmed = requisites.trim();
        user.requisites = (!trimmed.is_empty()).then(|| trimmed.to_string());
        user.clone()
    }

    pub fn requisites(&self, user_id: UserId) -> Option<String> {
        self.users
            .get(&user_id)
            .and_then(|user| user.requisites.clone())
    }

    /// Decrease a balance, failing rather than going negative
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `InsufficientFunds` if the balance is lower than `amount`
    pub fn debit(
        &self,
        user_id: UserId,
        amount: Decimal,
        cause: Cause,
    ) -> Result<Decimal, EscrowError> {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::invalid_amount(amount, "debit"));
        }

        let mut user = self
            .users
            .get_mut(&user_id)
            .ok_or_else(|| EscrowError::insufficient_funds(user_id, Decimal::ZERO, amount))?;

        if user.balance < amount {
            return Err(EscrowError::insufficient_funds(
                user_id,
                user.balance,
                amount,
            ));
        }

        let new_balance = user
            .balance
            .checked_sub(amount)
            .ok_or_else(|| EscrowError::arithmetic_overflow("debit", user_id))?;
        user.balance = new_balance;

        self.record(user_id, -amount, cause);
        Ok(new_balance)
    }

    /// Increase a balance, creating the row if needed
    ///
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if `amount` is not positive
    /// - `ArithmeticOverflow` if the balance cannot hold the result
    pub fn credit(
        &self,
        user_id: UserId,
        amount: Decimal,
        cause: Cause,
    ) -> Result<Decimal, EscrowError> {
        self.credit_with(user_id, amount, cause, |_| {})
    }

    /// Pay out a completed deal to its seller
    ///
    /// The credit and the `successful_deals` increment happen under the same
    /// entry lock.
    pub fn credit_deal_payout(
        &self,
        seller_id: UserId,
        amount: Decimal,
        deal_id: &str,
    ) -> Result<Decimal, EscrowError> {
        self.credit_with(seller_id, amount, Cause::deal_payout(deal_id), |user| {
            user.successful_deals = user.successful_deals.saturating_add(1);
        })
    }

    /// Raise a balance to the unlimited sentinel
    ///
    /// Test and operations tool only: this is the one mutation not balanced by
    /// a matching debit elsewhere, and it is journalled under the granting
    /// admin's id. A balance already at or above the sentinel is left alone.
    pub fn grant_unlimited(&self, user_id: UserId, granted_by: UserId) -> Decimal {
        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id));

        let delta = self.unlimited_balance - user.balance;
        if delta > Decimal::ZERO {
            user.balance = self.unlimited_balance;
            self.record(
                user_id,
                delta,
                Cause::new(EntryCause::AdminUnlimited, granted_by),
            );
        }
        user.balance
    }

    /// All users sorted by id
    pub fn all_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by_key(|user| user.user_id);
        users
    }

    /// Copy of the whole journal in sequence order
    pub fn journal(&self) -> Vec<LedgerEntry> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Journal entries that reference `reference` with the given cause
    pub fn entries_for(&self, cause: EntryCause, reference: &str) -> Vec<LedgerEntry> {
        self.journal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|entry| entry.cause == cause && entry.reference == reference)
            .cloned()
            .collect()
    }

    fn credit_with<F>(
        &self,
        user_id: UserId,
        amount: Decimal,
        cause: Cause,
        also: F,
    ) -> Result<Decimal, EscrowError>
    where
        F: FnOnce(&mut User),
    {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::invalid_amount(amount, "credit"));
        }

        let mut user = self
            .users
            .entry(user_id)
            .or_insert_with(|| User::new(user_id));

        let new_balance = user
            .balance
            .checked_add(amount)
            .ok_or_else(|| EscrowError::arithmetic_overflow("credit", user_id))?;
        user.balance = new_balance;
        also(user.value_mut());

        self.record(user_id, amount, cause);
        Ok(new_balance)
    }

    // Caller must hold the user's entry.
    fn record(&self, user_id: UserId, delta: Decimal, cause: Cause) {
        let mut journal = self.journal.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = journal.last().map_or(1, |entry| entry.seq + 1);

        debug!(
            user_id,
            %delta,
            cause = ?cause.kind,
            reference = %cause.reference,
            seq,
            "Balance changed"
        );

        journal.push(LedgerEntry {
            seq,
            user_id,
            delta,
            cause: cause.kind,
            reference: cause.reference,
            recorded_at: Utc::now(),
        });
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(Decimal::new(999_999, 0))
    }
}
