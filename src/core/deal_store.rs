//! Deal storage
//!
//! `DealStore` owns deal records and guarantees deal id uniqueness. It knows
//! nothing about balances: status-transition business rules live in the
//! [`EscrowEngine`](crate::core::EscrowEngine), which drives the low-level
//! setters here and couples them to ledger mutations.
//!
//! # Thread Safety
//!
//! Records live in a `DashMap`. [`DealStore::update`] runs a closure while
//! holding the deal's entry, which serialises all mutations of one deal and
//! turns every status change into a compare-and-swap on the current status.

use crate::config::EscrowConfig;
use crate::core::traits::DealIdGenerator;
use crate::types::{Deal, DealId, DealStatus, EscrowError, NewDeal, Party, UserId};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, warn};

const DEAL_ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DEAL_ID_LEN: usize = 6;

/// Six upper-case base-36 characters drawn from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDealIds;

impl DealIdGenerator for RandomDealIds {
    fn next_id(&self) -> DealId {
        let mut rng = rand::rng();
        (0..DEAL_ID_LEN)
            .map(|_| DEAL_ID_ALPHABET[rng.random_range(0..DEAL_ID_ALPHABET.len())] as char)
            .collect()
    }
}

/// Thread-safe store of deal records
pub struct DealStore {
    deals: DashMap<DealId, Deal>,
    ids: Box<dyn DealIdGenerator>,
    config: EscrowConfig,
}

impl DealStore {
    pub fn new(ids: Box<dyn DealIdGenerator>, config: EscrowConfig) -> Self {
        Self {
            deals: DashMap::new(),
            ids,
            config,
        }
    }

    /// Rebuild a store from persisted deals, rejecting duplicate ids
    pub fn restore(
        ids: Box<dyn DealIdGenerator>,
        config: EscrowConfig,
        deals: Vec<Deal>,
    ) -> Result<Self, EscrowError> {
        let store = Self::new(ids, config);
        for deal in deals {
            store.insert(deal)?;
        }
        Ok(store)
    }

    /// Persist a new active deal under a freshly generated id
    ///
    /// Colliding ids are retried with a new id up to `max_id_attempts` times;
    /// a collision is never surfaced to the seller.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` if the amount is not positive
    /// - `IdSpaceExhausted` if every attempt collided
    pub fn create_deal(&self, request: NewDeal) -> Result<Deal, EscrowError> {
        if request.amount <= Decimal::ZERO {
            return Err(EscrowError::invalid_amount(request.amount, "create deal"));
        }

        for _ in 0..self.config.max_id_attempts {
            let deal_id = self.ids.next_id();
            let deal = Deal::new(
                deal_id.clone(),
                request.seller_id,
                request.product_info.trim().to_string(),
                request.currency,
                request.amount,
                self.config.deal_link(&deal_id),
            );

            match self.insert(deal) {
                Ok(deal) => {
                    debug!(deal_id = %deal.deal_id, seller_id = deal.seller_id, "Deal created");
                    return Ok(deal);
                }
                Err(EscrowError::DuplicateId { deal_id }) => {
                    warn!(%deal_id, "Generated deal id collided, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(EscrowError::IdSpaceExhausted {
            attempts: self.config.max_id_attempts,
        })
    }

    /// Insert a fully formed deal
    ///
    /// # Errors
    ///
    /// `DuplicateId` if a deal with the same id already exists.
    pub(crate) fn insert(&self, deal: Deal) -> Result<Deal, EscrowError> {
        match self.deals.entry(deal.deal_id.clone()) {
            Entry::Occupied(_) => Err(EscrowError::DuplicateId {
                deal_id: deal.deal_id,
            }),
            Entry::Vacant(slot) => Ok(slot.insert(deal).clone()),
        }
    }

    /// Snapshot of a deal
    pub fn get_deal(&self, deal_id: &str) -> Result<Deal, EscrowError> {
        self.deals
            .get(deal_id)
            .map(|deal| deal.clone())
            .ok_or_else(|| EscrowError::deal_not_found(deal_id))
    }

    /// Run `f` on a deal while holding its entry
    ///
    /// The store does not roll back: `f` must run every fallible step before
    /// mutating the deal, so a status change and its ledger effect stay
    /// all-or-nothing.
    pub(crate) fn update<T, F>(&self, deal_id: &str, f: F) -> Result<T, EscrowError>
    where
        F: FnOnce(&mut Deal) -> Result<T, EscrowError>,
    {
        let mut deal = self
            .deals
            .get_mut(deal_id)
            .ok_or_else(|| EscrowError::deal_not_found(deal_id))?;
        f(deal.value_mut())
    }

    /// Set the buyer if none is bound yet and the buyer is not the seller
    pub(crate) fn bind_buyer(&self, deal_id: &str, buyer_id: UserId) -> Result<Deal, EscrowError> {
        self.update(deal_id, |deal| {
            deal.bind_buyer(buyer_id)?;
            Ok(deal.clone())
        })
    }

    /// Low-level status setter; only edges of the status graph are accepted
    pub(crate) fn set_status(&self, deal_id: &str, status: DealStatus) -> Result<Deal, EscrowError> {
        self.update(deal_id, |deal| {
            deal.advance(status)?;
            Ok(deal.clone())
        })
    }

    /// Low-level confirmation setter; each flag can be set once, by its party
    pub(crate) fn set_confirmed(
        &self,
        deal_id: &str,
        party: Party,
        user_id: UserId,
    ) -> Result<Deal, EscrowError> {
        self.update(deal_id, |deal| {
            deal.confirm(party, user_id)?;
            Ok(deal.clone())
        })
    }

    /// Deals where `user_id` is seller or buyer, newest first
    pub fn deals_for_user(&self, user_id: UserId) -> Vec<Deal> {
        self.collect_sorted(|deal| deal.seller_id == user_id || deal.buyer_id == Some(user_id))
    }

    /// Deals created at or after `since`, newest first, at most `limit` of them
    pub fn recent_deals(&self, since: DateTime<Utc>, limit: Option<usize>) -> Vec<Deal> {
        let mut deals = self.collect_sorted(|deal| deal.created_at >= since);
        if let Some(limit) = limit {
            deals.truncate(limit);
        }
        deals
    }

    /// Every deal, oldest first
    pub fn all_deals(&self) -> Vec<Deal> {
        let mut deals = self.collect_sorted(|_| true);
        deals.reverse();
        deals
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    fn collect_sorted<P>(&self, predicate: P) -> Vec<Deal>
    where
        P: Fn(&Deal) -> bool,
    {
        let mut deals: Vec<Deal> = self
            .deals
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        deals.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.deal_id.cmp(&a.deal_id))
        });
        deals
    }
}
