//! Command dispatch
//!
//! Plays the part of the chat layer: routes each structured [`Command`] to the
//! matching core operation and logs its outcome. Deal aliases given on
//! `create` are remembered so later commands in the same run can refer to the
//! deal without knowing its generated id.
//!
//! [`CommandDispatcher::footprint`] names the state a command can touch, so a
//! concurrent replayer knows which commands must keep their relative order.

use crate::core::service::EscrowService;
use crate::types::{Command, DealId, EscrowError, NewDeal, UserId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A piece of state a command may read or write
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateKey {
    User(UserId),
    /// A deal by alias or id, as written in the command file or resolved
    Deal(String),
    /// The withdrawal queue as a whole; request ids are handed out in order
    Withdrawals,
}

pub struct CommandDispatcher {
    service: Arc<EscrowService>,
    aliases: DashMap<String, DealId>,
}

impl CommandDispatcher {
    pub fn new(service: Arc<EscrowService>) -> Self {
        Self {
            service,
            aliases: DashMap::new(),
        }
    }

    pub fn service(&self) -> &Arc<EscrowService> {
        &self.service
    }

    /// Deal id behind `deal`: a known alias, or `deal` itself
    pub fn resolve(&self, deal: &str) -> DealId {
        self.aliases
            .get(deal)
            .map(|id| id.value().clone())
            .unwrap_or_else(|| deal.to_string())
    }

    /// State `command` may touch given the current contents of the stores
    ///
    /// Two commands with disjoint footprints commute. A deal's seller and
    /// buyer are included when the deal already exists, since payouts and
    /// refunds move their balances. Admin actors are left out: the allowlist
    /// is fixed and an admin's own row is never written by an admin command.
    pub fn footprint(&self, command: &Command) -> Vec<StateKey> {
        let mut keys = Vec::new();

        match command {
            Command::Register { user, .. } | Command::SetRequisites { user, .. } => {
                keys.push(StateKey::User(*user));
            }
            Command::CreateDeal { user, alias, .. } => {
                keys.push(StateKey::User(*user));
                if let Some(alias) = alias {
                    keys.push(StateKey::Deal(alias.clone()));
                }
            }
            Command::JoinDeal { user, deal }
            | Command::Pay { user, deal }
            | Command::ConfirmDelivery { user, deal }
            | Command::ConfirmReceipt { user, deal } => {
                keys.push(StateKey::User(*user));
                self.deal_footprint(deal, &mut keys);
            }
            Command::CancelDeal { deal, .. } => self.deal_footprint(deal, &mut keys),
            Command::Withdraw { user, .. } => {
                keys.push(StateKey::User(*user));
                keys.push(StateKey::Withdrawals);
            }
            Command::ProcessWithdrawal { id, .. } | Command::RejectWithdrawal { id, .. } => {
                keys.push(StateKey::Withdrawals);
                if let Ok(request) = self.service.withdrawals().get(*id) {
                    keys.push(StateKey::User(request.user_id));
                }
            }
            Command::GrantBalance { target, .. }
            | Command::GrantUnlimited { target, .. }
            | Command::Ban { target, .. }
            | Command::Unban { target, .. } => keys.push(StateKey::User(*target)),
        }

        keys
    }

    fn deal_footprint(&self, deal: &str, keys: &mut Vec<StateKey>) {
        keys.push(StateKey::Deal(deal.to_string()));

        let deal_id = self.resolve(deal);
        if let Ok(existing) = self.service.engine().get_deal(&deal_id) {
            keys.push(StateKey::User(existing.seller_id));
            keys.extend(existing.buyer_id.map(StateKey::User));
        }
        if deal_id != deal {
            keys.push(StateKey::Deal(deal_id));
        }
    }

    /// Run one command, logging a rejection before returning it
    pub fn dispatch(&self, command: &Command) -> Result<(), EscrowError> {
        let result = self.execute(command);
        if let Err(e) = &result {
            warn!(
                command = command.name(),
                user_id = command.user(),
                kind = ?e.kind(),
                "Command rejected: {}",
                e
            );
        }
        result
    }

    fn execute(&self, command: &Command) -> Result<(), EscrowError> {
        let engine = self.service.engine();
        let admin = self.service.admin();
        let ledger = self.service.ledger();

        match command {
            Command::Register { user, username } => {
                ledger.register(*user, username.as_deref());
            }
            Command::SetRequisites { user, requisites } => {
                ledger.register(*user, None);
                ledger.set_requisites(*user, requisites);
            }
            Command::CreateDeal {
                user,
                alias,
                product_info,
                currency,
                amount,
            } => {
                let deal = engine.create_deal(NewDeal {
                    seller_id: *user,
                    product_info: product_info.clone(),
                    currency: *currency,
                    amount: *amount,
                })?;
                debug!(deal_id = %deal.deal_id, link = %deal.deal_link, "Deal link ready");
                if let Some(alias) = alias {
                    if let Some(previous) = self.aliases.insert(alias.clone(), deal.deal_id) {
                        warn!(%alias, %previous, "Deal alias reassigned");
                    }
                }
            }
            Command::JoinDeal { user, deal } => {
                let joined = engine.join_deal(&self.resolve(deal), *user)?;
                debug!(
                    deal_id = %joined.deal.deal_id,
                    seller_successful_deals = joined.seller_successful_deals,
                    "Deal shown to buyer"
                );
            }
            Command::Pay { user, deal } => {
                let receipt = engine.pay(&self.resolve(deal), *user)?;
                debug!(seller_id = receipt.seller_id, "Notify seller of payment");
            }
            Command::ConfirmDelivery { user, deal } => {
                let confirmed = engine.confirm_delivery(&self.resolve(deal), *user)?;
                debug!(buyer_id = confirmed.buyer_id, "Notify buyer of delivery");
            }
            Command::ConfirmReceipt { user, deal } => {
                let completed = engine.confirm_receipt(&self.resolve(deal), *user)?;
                debug!(seller_id = completed.seller_id, "Notify seller of payout");
            }
            Command::CancelDeal { user, deal } => {
                admin.cancel_deal(*user, &self.resolve(deal))?;
            }
            Command::Withdraw {
                user,
                amount,
                destination,
            } => {
                self.service.withdrawals().request_withdrawal(
                    *user,
                    *amount,
                    destination.as_deref(),
                )?;
            }
            Command::ProcessWithdrawal { user, id } => {
                admin.process_withdrawal(*user, *id)?;
            }
            Command::RejectWithdrawal { user, id } => {
                admin.reject_withdrawal(*user, *id)?;
            }
            Command::GrantBalance {
                user,
                target,
                amount,
            } => {
                admin.grant_balance(*user, *target, *amount)?;
            }
            Command::GrantUnlimited { user, target } => {
                admin.grant_unlimited_balance(*user, *target)?;
            }
            Command::Ban { user, target } => {
                admin.ban_user(*user, *target)?;
            }
            Command::Unban { user, target } => {
                admin.unban_user(*user, *target)?;
            }
        }

        Ok(())
    }
}
