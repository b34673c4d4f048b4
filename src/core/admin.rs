//! Admin operations
//!
//! Shortcuts layered on the ledger, the engine and the withdrawal queue. Every
//! operation takes the acting user and checks it against the injected admin
//! allowlist first. Successful actions are logged under the `audit` target;
//! balance grants in particular, since they are not matched by a debit.

use crate::core::engine::EscrowEngine;
use crate::core::withdrawal_queue::WithdrawalQueue;
use crate::types::{
    Cause, Deal, DealCancelled, EntryCause, EscrowError, User, UserId, WithdrawalId,
    WithdrawalRequest,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AdminOps {
    admins: HashSet<UserId>,
    engine: Arc<EscrowEngine>,
    withdrawals: Arc<WithdrawalQueue>,
}

impl AdminOps {
    pub fn new(
        admins: impl IntoIterator<Item = UserId>,
        engine: Arc<EscrowEngine>,
        withdrawals: Arc<WithdrawalQueue>,
    ) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            engine,
            withdrawals,
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn ban_user(&self, actor: UserId, target: UserId) -> Result<User, EscrowError> {
        self.authorize(actor, "ban")?;
        let user = self.engine.ledger().set_banned(target, true);
        info!(target: "audit", actor, user_id = target, "User banned");
        Ok(user)
    }

    pub fn unban_user(&self, actor: UserId, target: UserId) -> Result<User, EscrowError> {
        self.authorize(actor, "unban")?;
        let user = self.engine.ledger().set_banned(target, false);
        info!(target: "audit", actor, user_id = target, "User unbanned");
        Ok(user)
    }

    /// Raise `target`'s balance to the unlimited sentinel
    ///
    /// Bypasses normal accounting; the journal entry names the admin.
    pub fn grant_unlimited_balance(
        &self,
        actor: UserId,
        target: UserId,
    ) -> Result<Decimal, EscrowError> {
        self.authorize(actor, "grant unlimited balance")?;
        let balance = self.engine.ledger().grant_unlimited(target, actor);
        info!(
            target: "audit",
            actor,
            user_id = target,
            %balance,
            "Unlimited balance granted"
        );
        Ok(balance)
    }

    /// Credit a test balance to `target`
    pub fn grant_balance(
        &self,
        actor: UserId,
        target: UserId,
        amount: Decimal,
    ) -> Result<Decimal, EscrowError> {
        self.authorize(actor, "grant balance")?;
        let balance = self.engine.ledger().credit(
            target,
            amount,
            Cause::new(EntryCause::AdminGrant, actor),
        )?;
        info!(
            target: "audit",
            actor,
            user_id = target,
            %amount,
            %balance,
            "Balance granted"
        );
        Ok(balance)
    }

    /// Deals created at or after `since`, newest first
    pub fn list_recent_deals(
        &self,
        actor: UserId,
        since: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<Deal>, EscrowError> {
        self.authorize(actor, "list deals")?;
        Ok(self.engine.deals().recent_deals(since, limit))
    }

    pub fn cancel_deal(&self, actor: UserId, deal_id: &str) -> Result<DealCancelled, EscrowError> {
        self.authorize(actor, "cancel deal")?;
        let cancelled = self.engine.cancel_deal(deal_id)?;
        info!(
            target: "audit",
            actor,
            deal_id,
            refunded = ?cancelled.refunded,
            "Deal cancelled"
        );
        Ok(cancelled)
    }

    pub fn process_withdrawal(
        &self,
        actor: UserId,
        id: WithdrawalId,
    ) -> Result<WithdrawalRequest, EscrowError> {
        self.authorize(actor, "process withdrawal")?;
        let request = self.withdrawals.mark_processed(id)?;
        info!(target: "audit", actor, id, "Withdrawal processed");
        Ok(request)
    }

    pub fn reject_withdrawal(
        &self,
        actor: UserId,
        id: WithdrawalId,
    ) -> Result<WithdrawalRequest, EscrowError> {
        self.authorize(actor, "reject withdrawal")?;
        let request = self.withdrawals.reject(id)?;
        info!(
            target: "audit",
            actor,
            id,
            refunded = %request.requested_amount,
            "Withdrawal rejected"
        );
        Ok(request)
    }

    fn authorize(&self, actor: UserId, operation: &str) -> Result<(), EscrowError> {
        if self.is_admin(actor) {
            Ok(())
        } else {
            warn!(actor, operation, "Admin operation refused");
            Err(EscrowError::unauthorized(actor, operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EscrowConfig;
    use crate::core::deal_store::{DealStore, RandomDealIds};
    use crate::core::ledger::Ledger;
    use crate::types::{Currency, DealStatus, NewDeal, WithdrawalStatus};
    use chrono::Duration;

    const ADMIN: UserId = 100;
    const USER: UserId = 5;

    fn admin_ops() -> AdminOps {
        let ledger = Arc::new(Ledger::default());
        let deals = Arc::new(DealStore::new(
            Box::new(RandomDealIds),
            EscrowConfig::default(),
        ));
        let engine = Arc::new(EscrowEngine::new(Arc::clone(&ledger), deals));
        let withdrawals = Arc::new(WithdrawalQueue::new(ledger, Decimal::new(10_000, 0)));
        AdminOps::new([ADMIN], engine, withdrawals)
    }

    #[test]
    fn test_non_admin_is_refused_without_effect() {
        let ops = admin_ops();

        let grant = ops.grant_unlimited_balance(USER, USER);
        let ban = ops.ban_user(USER, 6);

        assert_eq!(grant, Err(EscrowError::unauthorized(USER, "grant unlimited balance")));
        assert!(matches!(ban, Err(EscrowError::Unauthorized { .. })));
        assert_eq!(ops.engine.ledger().balance(USER), Decimal::ZERO);
        assert!(!ops.engine.ledger().is_banned(6));
    }

    #[test]
    fn test_ban_and_unban() {
        let ops = admin_ops();

        assert!(ops.ban_user(ADMIN, USER).unwrap().is_banned);
        assert!(ops.engine.ledger().is_banned(USER));
        assert!(!ops.unban_user(ADMIN, USER).unwrap().is_banned);
    }

    #[test]
    fn test_grants_are_journalled_under_the_admin() {
        let ops = admin_ops();

        ops.grant_balance(ADMIN, USER, Decimal::new(1500, 0)).unwrap();
        let unlimited = ops.grant_unlimited_balance(ADMIN, USER).unwrap();

        assert_eq!(unlimited, Decimal::new(999_999, 0));
        let journal = ops.engine.ledger().journal();
        assert_eq!(journal.len(), 2);
        assert!(journal.iter().all(|entry| entry.reference == ADMIN.to_string()));
        assert_eq!(journal[1].delta, Decimal::new(999_999 - 1500, 0));
    }

    #[test]
    fn test_grant_balance_rejects_non_positive_amount() {
        let ops = admin_ops();

        let result = ops.grant_balance(ADMIN, USER, Decimal::ZERO);

        assert!(matches!(result, Err(EscrowError::InvalidAmount { .. })));
    }

    #[test]
    fn test_cancel_paid_deal_refunds_buyer() {
        let ops = admin_ops();
        ops.grant_balance(ADMIN, USER, Decimal::new(2000, 0)).unwrap();
        let deal = ops
            .engine
            .create_deal(NewDeal {
                seller_id: 1,
                product_info: "Gift".into(),
                currency: Currency::Usdt,
                amount: Decimal::new(2000, 0),
            })
            .unwrap();
        ops.engine.pay(&deal.deal_id, USER).unwrap();

        let cancelled = ops.cancel_deal(ADMIN, &deal.deal_id).unwrap();

        assert_eq!(cancelled.refunded, Some(Decimal::new(2000, 0)));
        assert_eq!(ops.engine.ledger().balance(USER), Decimal::new(2000, 0));
        assert_eq!(
            ops.engine.get_deal(&deal.deal_id).unwrap().status,
            DealStatus::Cancelled
        );
    }

    #[test]
    fn test_list_recent_deals() {
        let ops = admin_ops();
        for seller in 1..=3 {
            ops.engine
                .create_deal(NewDeal {
                    seller_id: seller,
                    product_info: String::new(),
                    currency: Currency::Rub,
                    amount: Decimal::ONE,
                })
                .unwrap();
        }

        let all = ops
            .list_recent_deals(ADMIN, Utc::now() - Duration::days(3), None)
            .unwrap();
        let limited = ops
            .list_recent_deals(ADMIN, Utc::now() - Duration::days(3), Some(2))
            .unwrap();
        let refused = ops.list_recent_deals(USER, Utc::now(), None);

        assert_eq!(all.len(), 3);
        assert_eq!(limited.len(), 2);
        assert!(refused.is_err());
    }

    #[test]
    fn test_withdrawal_processing() {
        let ops = admin_ops();
        ops.grant_balance(ADMIN, USER, Decimal::new(30_000, 0)).unwrap();
        let first = ops
            .withdrawals
            .request_withdrawal(USER, Decimal::new(10_000, 0), Some("card"))
            .unwrap();
        let second = ops
            .withdrawals
            .request_withdrawal(USER, Decimal::new(10_000, 0), Some("card"))
            .unwrap();

        let processed = ops.process_withdrawal(ADMIN, first.id).unwrap();
        let rejected = ops.reject_withdrawal(ADMIN, second.id).unwrap();

        assert_eq!(processed.status, WithdrawalStatus::Processed);
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(ops.engine.ledger().balance(USER), Decimal::new(20_000, 0));
    }
}
