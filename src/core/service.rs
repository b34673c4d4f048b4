//! Escrow service facade
//!
//! Wires the ledger, deal store, engine, withdrawal queue and admin operations
//! together from one [`EscrowConfig`], either empty or from a persisted
//! [`StateSnapshot`].
//!
//! ```text
//! EscrowService
//!     ├── Arc<Ledger>            (balances, user rows, journal)
//!     ├── Arc<EscrowEngine>      (deal state machine over ledger + deal store)
//!     ├── Arc<WithdrawalQueue>   (payout requests over the ledger)
//!     └── AdminOps               (allowlisted shortcuts over the three above)
//! ```

use crate::config::EscrowConfig;
use crate::core::admin::AdminOps;
use crate::core::deal_store::{DealStore, RandomDealIds};
use crate::core::engine::EscrowEngine;
use crate::core::ledger::Ledger;
use crate::core::traits::DealIdGenerator;
use crate::core::withdrawal_queue::WithdrawalQueue;
use crate::types::{Deal, EscrowError, LedgerEntry, User, WithdrawalRequest};
use std::sync::Arc;
use tracing::info;

/// Persisted contents of every store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    pub users: Vec<User>,
    pub deals: Vec<Deal>,
    pub withdrawals: Vec<WithdrawalRequest>,
    pub journal: Vec<LedgerEntry>,
}

pub struct EscrowService {
    config: EscrowConfig,
    ledger: Arc<Ledger>,
    engine: Arc<EscrowEngine>,
    withdrawals: Arc<WithdrawalQueue>,
    admin: AdminOps,
}

impl EscrowService {
    /// Empty service with random deal ids
    pub fn new(config: EscrowConfig) -> Self {
        Self::with_id_generator(config, Box::new(RandomDealIds))
    }

    pub fn with_id_generator(config: EscrowConfig, ids: Box<dyn DealIdGenerator>) -> Self {
        let ledger = Arc::new(Ledger::new(config.unlimited_balance));
        let deals = Arc::new(DealStore::new(ids, config.clone()));
        let withdrawals = Arc::new(WithdrawalQueue::new(
            Arc::clone(&ledger),
            config.min_withdrawal,
        ));
        Self::assemble(config, ledger, deals, withdrawals)
    }

    /// Rebuild a service from a snapshot
    ///
    /// # Errors
    ///
    /// `ParseError` if the snapshot repeats a user, deal or withdrawal id, or
    /// holds a negative balance.
    pub fn restore(config: EscrowConfig, snapshot: StateSnapshot) -> Result<Self, EscrowError> {
        let StateSnapshot {
            users,
            deals,
            withdrawals,
            journal,
        } = snapshot;

        info!(
            users = users.len(),
            deals = deals.len(),
            withdrawals = withdrawals.len(),
            journal = journal.len(),
            "Restoring escrow state"
        );

        let ledger = Arc::new(Ledger::restore(config.unlimited_balance, users, journal)?);
        let deals = Arc::new(
            DealStore::restore(Box::new(RandomDealIds), config.clone(), deals)
                .map_err(|e| match e {
                    EscrowError::DuplicateId { deal_id } => EscrowError::parse_error(
                        None,
                        format!("duplicate deal id {}", deal_id),
                    ),
                    other => other,
                })?,
        );
        let withdrawals = Arc::new(WithdrawalQueue::restore(
            Arc::clone(&ledger),
            config.min_withdrawal,
            withdrawals,
        )?);

        Ok(Self::assemble(config, ledger, deals, withdrawals))
    }

    fn assemble(
        config: EscrowConfig,
        ledger: Arc<Ledger>,
        deals: Arc<DealStore>,
        withdrawals: Arc<WithdrawalQueue>,
    ) -> Self {
        let engine = Arc::new(EscrowEngine::new(Arc::clone(&ledger), deals));
        let admin = AdminOps::new(
            config.admin_ids.iter().copied(),
            Arc::clone(&engine),
            Arc::clone(&withdrawals),
        );

        Self {
            config,
            ledger,
            engine,
            withdrawals,
            admin,
        }
    }

    /// Copy of every store, for persistence
    ///
    /// Not a consistent cut under concurrent writes; take it at a quiescent
    /// point.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            users: self.ledger.all_users(),
            deals: self.engine.deals().all_deals(),
            withdrawals: self.withdrawals.all(),
            journal: self.ledger.journal(),
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<EscrowEngine> {
        &self.engine
    }

    pub fn withdrawals(&self) -> &Arc<WithdrawalQueue> {
        &self.withdrawals
    }

    pub fn admin(&self) -> &AdminOps {
        &self.admin
    }
}
