//! Escrow Engine Library
//! # Overview
//!
//! Core of a chat-bot escrow marketplace for digital goods. A seller creates a
//! deal, a buyer pays from an internal balance, the funds are held while the
//! seller delivers, and they are released once the buyer confirms receipt.
//! The chat layer itself lives elsewhere; this crate ships a CSV command
//! replayer (sync and async strategies) as its external caller.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (User, Deal, WithdrawalRequest, LedgerEntry, errors)
//! - [`config`] - Runtime configuration injected into the core
//! - [`core`] - Business logic components:
//!   - [`core::ledger`] - Balances, bans, requisites and the balance journal
//!   - [`core::deal_store`] - Deal records with unique generated ids
//!   - [`core::engine`] - The deal state machine (pay, confirm, cancel)
//!   - [`core::withdrawal_queue`] - Withdrawal requests with funds reserved up front
//!   - [`core::admin`] - Admin-gated operations with an audit trail
//!   - [`core::service`] - Wiring of the above from an `EscrowConfig`
//! - [`io`] - CSV command readers, users report and state snapshots
//! - [`strategy`] - Sync and async batch replay pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Deal Lifecycle
//!
//! ```text
//! active ──pay──▶ paid ──both confirmations──▶ completed
//!   │               │
//!   └──cancel──▶ cancelled ◀──cancel (refund)──┘
//! ```
//!
//! - **Pay**: the buyer's balance is debited by exactly the deal amount
//! - **Confirm delivery**: seller only, on a paid deal
//! - **Confirm receipt**: buyer only, after the seller; credits the seller the
//!   same amount and counts a successful deal
//! - **Cancel**: admin only; a paid deal refunds the buyer
//!
//! # Invariants
//!
//! Balances never go negative, every balance change is journalled against
//! exactly one cause, and deal transitions with ledger effects are
//! all-or-nothing even under concurrent requests.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::EscrowConfig;
pub use core::{
    AdminOps, CommandDispatcher, DealStore, EscrowEngine, EscrowService, Ledger, StateSnapshot,
    WithdrawalQueue,
};
pub use io::write_users_csv;
pub use types::{
    Command, Currency, Deal, DealId, DealStatus, EscrowError, LedgerEntry, User, UserId,
    WithdrawalRequest, WithdrawalStatus,
};
