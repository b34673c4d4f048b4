//! Deal-related types for the escrow engine
//!
//! This module defines the deal record, its status graph and the payloads the
//! engine hands back to the chat layer so it can notify the other party.

use super::error::EscrowError;
use super::user::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Short public deal identifier (six base-36 characters when generated)
pub type DealId = String;

/// Lifecycle status of a deal
///
/// Moves only forward:
///
/// ```text
/// active ──pay──> paid ──buyer confirms──> completed
///    │              │
///    └──cancel──────┴──cancel──> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    Active,
    Paid,
    Completed,
    Cancelled,
}

impl DealStatus {
    /// Whether the status graph has an edge from `self` to `next`
    pub fn can_transition_to(self, next: DealStatus) -> bool {
        matches!(
            (self, next),
            (DealStatus::Active, DealStatus::Paid)
                | (DealStatus::Active, DealStatus::Cancelled)
                | (DealStatus::Paid, DealStatus::Completed)
                | (DealStatus::Paid, DealStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DealStatus::Completed | DealStatus::Cancelled)
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DealStatus::Active => "active",
            DealStatus::Paid => "paid",
            DealStatus::Completed => "completed",
            DealStatus::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Side of a deal a user acts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Seller,
    Buyer,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Seller => f.write_str("seller"),
            Party::Buyer => f.write_str("buyer"),
        }
    }
}

/// Currency a deal is denominated in
///
/// Informational only: balances are kept in a single unit and no conversion
/// takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Rub,
    Ton,
    Usdt,
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "RUB" => Ok(Currency::Rub),
            "TON" => Ok(Currency::Ton),
            "USDT" => Ok(Currency::Usdt),
            other => Err(format!("Unknown currency '{}'", other)),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Rub => f.write_str("RUB"),
            Currency::Ton => f.write_str("TON"),
            Currency::Usdt => f.write_str("USDT"),
        }
    }
}

/// An escrow deal between a seller and (eventually) a buyer
///
/// `amount` is fixed at creation and never mutated, `buyer_id` is set at most
/// once, and both confirmation flags only ever go from false to true. The
/// mutating methods below enforce this; they do not touch balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: DealId,
    pub seller_id: UserId,
    pub buyer_id: Option<UserId>,
    pub product_info: String,
    pub currency: Currency,
    pub amount: Decimal,
    pub status: DealStatus,
    pub seller_confirmed: bool,
    pub buyer_confirmed: bool,
    pub deal_link: String,
    pub created_at: DateTime<Utc>,
}

impl Deal {
    pub fn new(
        deal_id: DealId,
        seller_id: UserId,
        product_info: String,
        currency: Currency,
        amount: Decimal,
        deal_link: String,
    ) -> Self {
        Deal {
            deal_id,
            seller_id,
            buyer_id: None,
            product_info,
            currency,
            amount,
            status: DealStatus::Active,
            seller_confirmed: false,
            buyer_confirmed: false,
            deal_link,
            created_at: Utc::now(),
        }
    }

    /// The user of record for `party`, if any
    pub fn party_user(&self, party: Party) -> Option<UserId> {
        match party {
            Party::Seller => Some(self.seller_id),
            Party::Buyer => self.buyer_id,
        }
    }

    /// Bind `buyer` to an active deal that has no buyer yet
    pub fn bind_buyer(&mut self, buyer: UserId) -> Result<(), EscrowError> {
        if buyer == self.seller_id {
            return Err(EscrowError::self_deal(&self.deal_id, buyer));
        }
        if self.status != DealStatus::Active {
            return Err(EscrowError::invalid_state(
                &self.deal_id,
                self.status,
                "bind buyer",
            ));
        }
        if self.buyer_id.is_some() {
            return Err(EscrowError::AlreadyHasBuyer {
                deal_id: self.deal_id.clone(),
            });
        }

        self.buyer_id = Some(buyer);
        Ok(())
    }

    /// Move along one edge of the status graph
    pub fn advance(&mut self, next: DealStatus) -> Result<(), EscrowError> {
        if !self.status.can_transition_to(next) {
            return Err(EscrowError::invalid_state(
                &self.deal_id,
                self.status,
                &format!("move to {}", next),
            ));
        }

        self.status = next;
        Ok(())
    }

    /// Check that `user` may confirm this deal as `party` right now
    ///
    /// A buyer may only confirm after the seller has attested delivery.
    pub fn check_confirmation(&self, party: Party, user: UserId) -> Result<(), EscrowError> {
        if self.party_user(party) != Some(user) {
            return Err(EscrowError::not_your_deal(&self.deal_id, user, party));
        }

        let already = match party {
            Party::Seller => self.seller_confirmed,
            Party::Buyer => self.buyer_confirmed,
        };
        if already {
            return Err(EscrowError::already_confirmed(&self.deal_id, party));
        }

        if self.status != DealStatus::Paid {
            return Err(EscrowError::invalid_state(
                &self.deal_id,
                self.status,
                "confirm",
            ));
        }

        if party == Party::Buyer && !self.seller_confirmed {
            return Err(EscrowError::SellerHasNotConfirmed {
                deal_id: self.deal_id.clone(),
            });
        }

        Ok(())
    }

    /// Set the confirmation flag of `party` after [`Deal::check_confirmation`]
    pub fn confirm(&mut self, party: Party, user: UserId) -> Result<(), EscrowError> {
        self.check_confirmation(party, user)?;

        match party {
            Party::Seller => self.seller_confirmed = true,
            Party::Buyer => self.buyer_confirmed = true,
        }
        Ok(())
    }
}

/// Fully assembled request to open a deal
///
/// The chat layer collects these fields over as many turns as it likes and
/// calls `create_deal` once.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeal {
    pub seller_id: UserId,
    pub product_info: String,
    pub currency: Currency,
    pub amount: Decimal,
}

/// Returned by a successful payment so the seller can be notified
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub deal_id: DealId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    pub amount: Decimal,
    pub currency: Currency,
}

/// Returned when the seller attests delivery, so the buyer can be notified
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfirmed {
    pub deal_id: DealId,
    pub buyer_id: UserId,
}

/// Returned when the buyer confirms receipt and the seller is paid out
#[derive(Debug, Clone, PartialEq)]
pub struct DealCompleted {
    pub deal_id: DealId,
    pub seller_id: UserId,
    pub payout: Decimal,
    pub currency: Currency,
}

/// Returned when a deal is cancelled; `refunded` is set if the buyer got money back
#[derive(Debug, Clone, PartialEq)]
pub struct DealCancelled {
    pub deal_id: DealId,
    pub seller_id: UserId,
    pub buyer_id: Option<UserId>,
    pub refunded: Option<Decimal>,
}

/// What a buyer sees after opening a deal link
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedDeal {
    pub deal: Deal,
    pub seller_successful_deals: u32,
}
