//! Withdrawal queue
//!
//! Records user-initiated payout requests against the ledger. Funds are
//! reserved at request time: the ledger debit happens first and the request is
//! only recorded once the debit succeeded, so a pending request always stands
//! for money that already left the visible balance.
//!
//! Paying out is an external concern. Admins close a request either as
//! processed (paid out elsewhere) or rejected, which refunds the reserved
//! amount under the request's entry lock.

use crate::core::ledger::Ledger;
use crate::types::{
    Cause, EntryCause, EscrowError, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct WithdrawalQueue {
    ledger: Arc<Ledger>,
    requests: DashMap<WithdrawalId, WithdrawalRequest>,
    next_id: AtomicU64,
    min_withdrawal: Decimal,
}

impl WithdrawalQueue {
    pub fn new(ledger: Arc<Ledger>, min_withdrawal: Decimal) -> Self {
        Self {
            ledger,
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
            min_withdrawal,
        }
    }

    /// Rebuild the queue from persisted requests
    ///
    /// New ids continue after the highest restored one.
    pub fn restore(
        ledger: Arc<Ledger>,
        min_withdrawal: Decimal,
        requests: Vec<WithdrawalRequest>,
    ) -> Result<Self, EscrowError> {
        let queue = Self::new(ledger, min_withdrawal);
        let mut max_id = 0;

        for request in requests {
            let id = request.id;
            if queue.requests.insert(id, request).is_some() {
                return Err(EscrowError::parse_error(
                    None,
                    format!("duplicate withdrawal id {}", id),
                ));
            }
            max_id = max_id.max(id);
        }

        queue.next_id.store(max_id + 1, Ordering::SeqCst);
        Ok(queue)
    }

    /// Reserve funds and enqueue a pending payout request
    ///
    /// `destination` falls back to the user's stored requisites when absent
    /// or blank.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for a non-positive amount
    /// - `BelowMinimum` if the amount is under the configured floor
    /// - `UserBanned` if the user is banned
    /// - `MissingDestination` if no destination is known
    /// - `InsufficientFunds` if the ledger debit fails
    pub fn request_withdrawal(
        &self,
        user_id: UserId,
        amount: Decimal,
        destination: Option<&str>,
    ) -> Result<WithdrawalRequest, EscrowError> {
        if amount <= Decimal::ZERO {
            return Err(EscrowError::invalid_amount(amount, "withdrawal"));
        }
        if amount < self.min_withdrawal {
            return Err(EscrowError::BelowMinimum {
                amount,
                minimum: self.min_withdrawal,
            });
        }
        if self.ledger.is_banned(user_id) {
            return Err(EscrowError::UserBanned { user: user_id });
        }

        let payout_destination = destination
            .map(str::trim)
            .filter(|dest| !dest.is_empty())
            .map(str::to_string)
            .or_else(|| self.ledger.requisites(user_id))
            .ok_or(EscrowError::MissingDestination { user: user_id })?;

        // A failed debit burns the id; ids are unique, not dense
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.ledger
            .debit(user_id, amount, Cause::new(EntryCause::Withdrawal, id))?;

        let request = WithdrawalRequest {
            id,
            user_id,
            requested_amount: amount,
            payout_destination,
            status: WithdrawalStatus::Pending,
            created_at: Utc::now(),
        };
        self.requests.insert(id, request.clone());

        debug!(id, user_id, %amount, "Withdrawal requested");
        Ok(request)
    }

    /// Close a pending request as paid out
    pub fn mark_processed(&self, id: WithdrawalId) -> Result<WithdrawalRequest, EscrowError> {
        self.close(id, WithdrawalStatus::Processed, |_| Ok(()))
    }

    /// Close a pending request as refused, refunding the reserved amount
    pub fn reject(&self, id: WithdrawalId) -> Result<WithdrawalRequest, EscrowError> {
        self.close(id, WithdrawalStatus::Rejected, |request| {
            self.ledger
                .credit(
                    request.user_id,
                    request.requested_amount,
                    Cause::new(EntryCause::WithdrawalRefund, request.id),
                )
                .map(|_| ())
        })
    }

    pub fn get(&self, id: WithdrawalId) -> Result<WithdrawalRequest, EscrowError> {
        self.requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(EscrowError::WithdrawalNotFound { id })
    }

    /// Pending requests, oldest first
    pub fn pending(&self) -> Vec<WithdrawalRequest> {
        self.collect(|request| request.status == WithdrawalStatus::Pending)
    }

    pub fn for_user(&self, user_id: UserId) -> Vec<WithdrawalRequest> {
        self.collect(|request| request.user_id == user_id)
    }

    /// Every request ordered by id
    pub fn all(&self) -> Vec<WithdrawalRequest> {
        self.collect(|_| true)
    }

    fn close<F>(
        &self,
        id: WithdrawalId,
        status: WithdrawalStatus,
        effect: F,
    ) -> Result<WithdrawalRequest, EscrowError>
    where
        F: FnOnce(&WithdrawalRequest) -> Result<(), EscrowError>,
    {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(EscrowError::WithdrawalNotFound { id })?;

        if entry.status != WithdrawalStatus::Pending {
            return Err(EscrowError::WithdrawalNotPending {
                id,
                status: entry.status,
            });
        }

        effect(entry.value())?;
        entry.status = status;

        debug!(id, %status, "Withdrawal closed");
        Ok(entry.value().clone())
    }

    fn collect<P>(&self, predicate: P) -> Vec<WithdrawalRequest>
    where
        P: Fn(&WithdrawalRequest) -> bool,
    {
        let mut requests: Vec<WithdrawalRequest> = self
            .requests
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by_key(|request| request.id);
        requests
    }
}
