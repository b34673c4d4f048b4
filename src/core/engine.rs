//! Deal lifecycle engine
//!
//! This module provides the `EscrowEngine`, the only component allowed to move
//! a deal through its lifecycle and the only one allowed to couple a status
//! change to a ledger mutation.
//!
//! The engine enforces business rules such as:
//! - Payment binds the buyer, debits them and marks the deal paid in one step
//! - The seller must attest delivery before the buyer can release the funds
//! - The payout equals the payment exactly (no fees)
//! - Banned users cannot open, join or pay for deals
//!
//! # Atomicity
//!
//! Every money-moving transition runs inside [`DealStore::update`], i.e. while
//! holding the deal's entry. All fallible checks and the (fallible) ledger call
//! come first; the deal fields are written only after the ledger call has
//! succeeded, and those writes cannot fail. A rejected call therefore leaves
//! both the deal and the balances untouched, and a competing call on the same
//! deal observes either the state before or after the whole transition.

use crate::core::deal_store::DealStore;
use crate::core::ledger::Ledger;
use crate::types::{
    Cause, Deal, DealCancelled, DealCompleted, DealStatus, DeliveryConfirmed, EscrowError,
    JoinedDeal, NewDeal, Party, PaymentReceipt, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Deal state machine
///
/// Orchestrates the `DealStore` and the `Ledger`. Cheap to share: both
/// components sit behind `Arc`s.
pub struct EscrowEngine {
    ledger: Arc<Ledger>,
    deals: Arc<DealStore>,
}

impl EscrowEngine {
    /// Create an engine over existing components
    pub fn new(ledger: Arc<Ledger>, deals: Arc<DealStore>) -> Self {
        EscrowEngine { ledger, deals }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Read-only view of the deal store
    ///
    /// Mutations go through the engine; the store's setters are not public.
    ///
    /// ```compile_fail
    /// use escrow_engine::{DealStatus, EscrowConfig, EscrowService};
    ///
    /// let service = EscrowService::new(EscrowConfig::default());
    /// service.engine().deals().set_status("K3X9QZ", DealStatus::Paid);
    /// ```
    pub fn deals(&self) -> &Arc<DealStore> {
        &self.deals
    }

    /// Open a new deal for a seller
    ///
    /// The request is expected to be fully assembled by the caller. The seller
    /// row is created once the deal exists, so a rejected request leaves no
    /// trace.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The seller is banned
    /// - The amount is not positive
    /// - No unique deal id could be generated
    pub fn create_deal(&self, request: NewDeal) -> Result<Deal, EscrowError> {
        if self.ledger.is_banned(request.seller_id) {
            return Err(EscrowError::UserBanned {
                user: request.seller_id,
            });
        }

        let seller_id = request.seller_id;
        let deal = self.deals.create_deal(request)?;
        self.ledger.register(seller_id, None);
        Ok(deal)
    }

    pub fn get_deal(&self, deal_id: &str) -> Result<Deal, EscrowError> {
        self.deals.get_deal(deal_id)
    }

    /// Buyer opens a deal link
    ///
    /// Binds the buyer to the deal if nobody is bound yet. Opening the link
    /// again as the same buyer just returns the deal. The seller's completed
    /// deal count is returned alongside so the buyer can judge the seller.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deal does not exist
    /// - The buyer is banned
    /// - The buyer is the seller
    /// - Another buyer is already bound, or the deal is no longer active
    pub fn join_deal(&self, deal_id: &str, buyer_id: UserId) -> Result<JoinedDeal, EscrowError> {
        if self.ledger.is_banned(buyer_id) {
            return Err(EscrowError::UserBanned { user: buyer_id });
        }

        let deal = match self.deals.bind_buyer(deal_id, buyer_id) {
            Ok(deal) => {
                debug!(deal_id = %deal.deal_id, buyer_id, "Buyer joined deal");
                deal
            }
            Err(e) => {
                // A bound buyer never changes, so reopening the link is safe
                let deal = self.deals.get_deal(deal_id)?;
                if deal.buyer_id != Some(buyer_id) {
                    return Err(e);
                }
                deal
            }
        };

        self.ledger.register(buyer_id, None);
        let seller_successful_deals = self
            .ledger
            .get_user(deal.seller_id)
            .map_or(0, |seller| seller.successful_deals);

        Ok(JoinedDeal {
            deal,
            seller_successful_deals,
        })
    }

    /// Pay for an active deal from the buyer's balance
    ///
    /// Binds the buyer (unless this buyer is already bound), debits the deal
    /// amount and moves the deal to `paid`, all while holding the deal. Of two
    /// buyers racing on the same deal exactly one is debited; the other sees
    /// `InvalidState`.
    ///
    /// # Returns
    ///
    /// A receipt naming the seller, so the caller can notify them
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deal does not exist (`DealNotFound`)
    /// - The buyer is the seller (`SelfDealNotAllowed`)
    /// - The same buyer already paid (`AlreadyPaid`)
    /// - The deal is not active (`InvalidState`)
    /// - Another buyer joined first (`AlreadyHasBuyer`)
    /// - The buyer is banned (`UserBanned`)
    /// - The buyer's balance is below the amount (`InsufficientFunds`)
    pub fn pay(&self, deal_id: &str, buyer_id: UserId) -> Result<PaymentReceipt, EscrowError> {
        let receipt = self.deals.update(deal_id, |deal| {
            if buyer_id == deal.seller_id {
                return Err(EscrowError::self_deal(&deal.deal_id, buyer_id));
            }

            match deal.status {
                DealStatus::Active => {}
                DealStatus::Paid if deal.buyer_id == Some(buyer_id) => {
                    return Err(EscrowError::AlreadyPaid {
                        deal_id: deal.deal_id.clone(),
                    });
                }
                status => return Err(EscrowError::invalid_state(&deal.deal_id, status, "pay")),
            }

            if deal.buyer_id.is_some_and(|bound| bound != buyer_id) {
                return Err(EscrowError::AlreadyHasBuyer {
                    deal_id: deal.deal_id.clone(),
                });
            }

            if self.ledger.is_banned(buyer_id) {
                return Err(EscrowError::UserBanned { user: buyer_id });
            }

            self.ledger
                .debit(buyer_id, deal.amount, Cause::deal_payment(&deal.deal_id))?;

            // Debit succeeded; nothing below can fail
            deal.buyer_id = Some(buyer_id);
            deal.status = DealStatus::Paid;

            Ok(PaymentReceipt {
                deal_id: deal.deal_id.clone(),
                seller_id: deal.seller_id,
                buyer_id,
                amount: deal.amount,
                currency: deal.currency,
            })
        })?;

        debug!(
            deal_id = %receipt.deal_id,
            buyer_id,
            amount = %receipt.amount,
            "Deal paid"
        );
        Ok(receipt)
    }

    /// Seller attests that the goods were delivered
    ///
    /// Sets `seller_confirmed`; the status stays `paid` and no money moves.
    ///
    /// # Returns
    ///
    /// The buyer to notify
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deal does not exist
    /// - The caller is not the seller of record (`NotYourDeal`)
    /// - The seller already confirmed (`AlreadyConfirmed`)
    /// - The deal is not paid (`InvalidState`)
    pub fn confirm_delivery(
        &self,
        deal_id: &str,
        seller_id: UserId,
    ) -> Result<DeliveryConfirmed, EscrowError> {
        // Only a paid deal can be confirmed, and a paid deal has a buyer
        let deal = self.deals.set_confirmed(deal_id, Party::Seller, seller_id)?;
        let buyer_id = deal.buyer_id.ok_or_else(|| {
            EscrowError::invalid_state(&deal.deal_id, deal.status, "confirm delivery")
        })?;
        let confirmed = DeliveryConfirmed {
            deal_id: deal.deal_id,
            buyer_id,
        };

        debug!(deal_id = %confirmed.deal_id, seller_id, "Delivery confirmed");
        Ok(confirmed)
    }

    /// Buyer confirms receipt, releasing the funds to the seller
    ///
    /// Sets `buyer_confirmed`, completes the deal, credits the seller exactly
    /// the paid amount and bumps their `successful_deals`, as one unit.
    ///
    /// # Returns
    ///
    /// The seller and the payout, so the caller can notify them
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deal does not exist
    /// - The caller is not the buyer of record (`NotYourDeal`)
    /// - The buyer already confirmed (`AlreadyConfirmed`)
    /// - The deal is not paid (`InvalidState`)
    /// - The seller has not confirmed delivery yet (`SellerHasNotConfirmed`)
    pub fn confirm_receipt(
        &self,
        deal_id: &str,
        buyer_id: UserId,
    ) -> Result<DealCompleted, EscrowError> {
        let completed = self.deals.update(deal_id, |deal| {
            deal.check_confirmation(Party::Buyer, buyer_id)?;

            self.ledger
                .credit_deal_payout(deal.seller_id, deal.amount, &deal.deal_id)?;

            // Payout succeeded; nothing below can fail
            deal.buyer_confirmed = true;
            deal.status = DealStatus::Completed;

            Ok(DealCompleted {
                deal_id: deal.deal_id.clone(),
                seller_id: deal.seller_id,
                payout: deal.amount,
                currency: deal.currency,
            })
        })?;

        debug!(
            deal_id = %completed.deal_id,
            seller_id = completed.seller_id,
            payout = %completed.payout,
            "Deal completed"
        );
        Ok(completed)
    }

    /// Cancel an active or paid deal
    ///
    /// A paid deal refunds the buyer exactly the deal amount in the same unit
    /// as the status change. Not exposed to deal parties; admins reach it
    /// through [`AdminOps::cancel_deal`](crate::core::AdminOps::cancel_deal).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The deal does not exist
    /// - The deal is already completed or cancelled (`InvalidState`)
    pub fn cancel_deal(&self, deal_id: &str) -> Result<DealCancelled, EscrowError> {
        let cancelled = self.deals.update(deal_id, |deal| {
            if !deal.status.can_transition_to(DealStatus::Cancelled) {
                return Err(EscrowError::invalid_state(
                    &deal.deal_id,
                    deal.status,
                    "cancel",
                ));
            }

            let refunded = match (deal.status, deal.buyer_id) {
                (DealStatus::Paid, Some(buyer_id)) => {
                    self.ledger
                        .credit(buyer_id, deal.amount, Cause::deal_refund(&deal.deal_id))?;
                    Some(deal.amount)
                }
                _ => None,
            };

            deal.status = DealStatus::Cancelled;

            Ok(DealCancelled {
                deal_id: deal.deal_id.clone(),
                seller_id: deal.seller_id,
                buyer_id: deal.buyer_id,
                refunded,
            })
        })?;

        debug!(deal_id = %cancelled.deal_id, refunded = ?cancelled.refunded, "Deal cancelled");
        Ok(cancelled)
    }

    /// Deals the user takes part in, newest first
    pub fn deals_for_user(&self, user_id: UserId) -> Vec<Deal> {
        self.deals.deals_for_user(user_id)
    }
}
