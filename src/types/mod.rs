//! Types module
//!
//! Contains core data structures used throughout the application:
//! - `user`: User rows and identifiers
//! - `command`: Structured commands from the chat layer
//! - `deal`: Deals, their status graph and notification payloads
//! - `withdrawal`: Withdrawal requests
//! - `ledger`: Balance journal entries and their causes
//! - `error`: Error types for the escrow engine

pub mod command;
pub mod deal;
pub mod error;
pub mod ledger;
pub mod user;
pub mod withdrawal;

pub use command::Command;
pub use deal::{
    Currency, Deal, DealCancelled, DealCompleted, DealId, DealStatus, DeliveryConfirmed,
    JoinedDeal, NewDeal, Party, PaymentReceipt,
};
pub use error::{ErrorKind, EscrowError};
pub use ledger::{Cause, EntryCause, LedgerEntry};
pub use user::{User, UserId};
pub use withdrawal::{WithdrawalId, WithdrawalRequest, WithdrawalStatus};
