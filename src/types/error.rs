//! Error types for the escrow engine
//!
//! Every core operation returns either a success value or one specific
//! [`EscrowError`]. There is no "best effort" mode for operations that move
//! money: a failed call leaves no partial state behind.
//!
//! # Error Categories
//!
//! - **Validation**: bad amount, self-deal, below-minimum withdrawal. Rejected
//!   before any mutation; safe to retry with corrected input.
//! - **State conflict**: the deal or request is not in the state the call
//!   needs (a race or an out-of-order call). Show a message, do not retry.
//! - **Resource**: insufficient funds, unknown deal. User-correctable or terminal.
//! - **Infrastructure**: I/O, snapshot parsing, id space exhaustion. Retry the
//!   whole operation after backoff.

use crate::types::deal::{DealId, DealStatus, Party};
use crate::types::user::UserId;
use crate::types::withdrawal::{WithdrawalId, WithdrawalStatus};
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of an [`EscrowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    Resource,
    Infrastructure,
}

impl ErrorKind {
    /// Whether the caller should retry the whole operation after backoff
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Infrastructure)
    }
}

/// Main error type for the escrow engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EscrowError {
    /// Amount is zero, negative or otherwise unusable
    #[error("Invalid amount {amount} for {operation}")]
    InvalidAmount {
        amount: Decimal,
        operation: String,
    },

    /// Debit would take the balance below zero
    #[error("Insufficient funds for user {user}: available {available}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        available: Decimal,
        requested: Decimal,
    },

    /// Credit would overflow the balance representation
    #[error("Arithmetic overflow in {operation} for user {user}")]
    ArithmeticOverflow { operation: String, user: UserId },

    /// Withdrawal amount is under the configured floor
    #[error("Withdrawal of {amount} is below the minimum of {minimum}")]
    BelowMinimum { amount: Decimal, minimum: Decimal },

    /// No explicit payout destination and no stored requisites
    #[error("No payout destination for user {user}")]
    MissingDestination { user: UserId },

    /// Seller tried to act as the buyer of their own deal
    #[error("User {user} cannot take part in their own deal {deal_id}")]
    SelfDealNotAllowed { deal_id: DealId, user: UserId },

    #[error("User {user} is banned")]
    UserBanned { user: UserId },

    /// Admin operation invoked by a user outside the allowlist
    #[error("User {user} is not authorized for {operation}")]
    Unauthorized { user: UserId, operation: String },

    #[error("Deal {deal_id} not found")]
    DealNotFound { deal_id: DealId },

    #[error("Withdrawal request {id} not found")]
    WithdrawalNotFound { id: WithdrawalId },

    /// Generated deal id collided with an existing one
    #[error("Deal id {deal_id} already exists")]
    DuplicateId { deal_id: DealId },

    /// Operation not allowed in the deal's current status
    #[error("Deal {deal_id} is {status}, cannot {operation}")]
    InvalidState {
        deal_id: DealId,
        status: DealStatus,
        operation: String,
    },

    /// The same buyer tried to pay a deal they already paid
    #[error("Deal {deal_id} is already paid")]
    AlreadyPaid { deal_id: DealId },

    #[error("Deal {deal_id} already confirmed by the {party}")]
    AlreadyConfirmed { deal_id: DealId, party: Party },

    #[error("Deal {deal_id} already has a buyer")]
    AlreadyHasBuyer { deal_id: DealId },

    /// Buyer confirmation attempted before the seller attested delivery
    #[error("Seller has not confirmed delivery for deal {deal_id}")]
    SellerHasNotConfirmed { deal_id: DealId },

    #[error("User {user} is not the {party} of deal {deal_id}")]
    NotYourDeal {
        deal_id: DealId,
        user: UserId,
        party: Party,
    },

    #[error("Withdrawal request {id} is {status}, expected pending")]
    WithdrawalNotPending { id: WithdrawalId, status: WithdrawalStatus },

    /// Every generated deal id collided; the id space is saturated
    #[error("Could not generate a unique deal id after {attempts} attempts")]
    IdSpaceExhausted { attempts: u32 },

    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Malformed snapshot or command data
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl EscrowError {
    /// Classify this error according to the retry policy
    pub fn kind(&self) -> ErrorKind {
        match self {
            EscrowError::InvalidAmount { .. }
            | EscrowError::ArithmeticOverflow { .. }
            | EscrowError::BelowMinimum { .. }
            | EscrowError::MissingDestination { .. }
            | EscrowError::SelfDealNotAllowed { .. }
            | EscrowError::UserBanned { .. }
            | EscrowError::Unauthorized { .. } => ErrorKind::Validation,
            EscrowError::InvalidState { .. }
            | EscrowError::AlreadyPaid { .. }
            | EscrowError::AlreadyConfirmed { .. }
            | EscrowError::AlreadyHasBuyer { .. }
            | EscrowError::SellerHasNotConfirmed { .. }
            | EscrowError::NotYourDeal { .. }
            | EscrowError::WithdrawalNotPending { .. }
            | EscrowError::DuplicateId { .. } => ErrorKind::StateConflict,
            EscrowError::InsufficientFunds { .. }
            | EscrowError::DealNotFound { .. }
            | EscrowError::WithdrawalNotFound { .. } => ErrorKind::Resource,
            EscrowError::IdSpaceExhausted { .. }
            | EscrowError::IoError { .. }
            | EscrowError::ParseError { .. } => ErrorKind::Infrastructure,
        }
    }
}

impl From<std::io::Error> for EscrowError {
    fn from(error: std::io::Error) -> Self {
        EscrowError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for EscrowError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        EscrowError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl EscrowError {
    pub fn invalid_amount(amount: Decimal, operation: &str) -> Self {
        EscrowError::InvalidAmount {
            amount,
            operation: operation.to_string(),
        }
    }

    pub fn insufficient_funds(user: UserId, available: Decimal, requested: Decimal) -> Self {
        EscrowError::InsufficientFunds {
            user,
            available,
            requested,
        }
    }

    pub fn arithmetic_overflow(operation: &str, user: UserId) -> Self {
        EscrowError::ArithmeticOverflow {
            operation: operation.to_string(),
            user,
        }
    }

    pub fn deal_not_found(deal_id: &str) -> Self {
        EscrowError::DealNotFound {
            deal_id: deal_id.to_string(),
        }
    }

    pub fn invalid_state(deal_id: &str, status: DealStatus, operation: &str) -> Self {
        EscrowError::InvalidState {
            deal_id: deal_id.to_string(),
            status,
            operation: operation.to_string(),
        }
    }

    pub fn self_deal(deal_id: &str, user: UserId) -> Self {
        EscrowError::SelfDealNotAllowed {
            deal_id: deal_id.to_string(),
            user,
        }
    }

    pub fn not_your_deal(deal_id: &str, user: UserId, party: Party) -> Self {
        EscrowError::NotYourDeal {
            deal_id: deal_id.to_string(),
            user,
            party,
        }
    }

    pub fn already_confirmed(deal_id: &str, party: Party) -> Self {
        EscrowError::AlreadyConfirmed {
            deal_id: deal_id.to_string(),
            party,
        }
    }

    pub fn unauthorized(user: UserId, operation: &str) -> Self {
        EscrowError::Unauthorized {
            user,
            operation: operation.to_string(),
        }
    }

    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        EscrowError::ParseError {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::insufficient_funds(
        EscrowError::insufficient_funds(7, Decimal::new(200, 0), Decimal::new(1000, 0)),
        "Insufficient funds for user 7: available 200, requested 1000"
    )]
    #[case::invalid_state(
        EscrowError::invalid_state("AB12CD", DealStatus::Completed, "pay"),
        "Deal AB12CD is completed, cannot pay"
    )]
    #[case::not_your_deal(
        EscrowError::not_your_deal("AB12CD", 3, Party::Buyer),
        "User 3 is not the buyer of deal AB12CD"
    )]
    #[case::already_confirmed(
        EscrowError::already_confirmed("AB12CD", Party::Seller),
        "Deal AB12CD already confirmed by the seller"
    )]
    #[case::parse_error_with_line(
        EscrowError::parse_error(Some(4), "bad field"),
        "CSV parse error at line 4: bad field"
    )]
    #[case::parse_error_without_line(
        EscrowError::parse_error(None, "bad field"),
        "CSV parse error: bad field"
    )]
    #[case::below_minimum(
        EscrowError::BelowMinimum { amount: Decimal::new(500, 0), minimum: Decimal::new(10000, 0) },
        "Withdrawal of 500 is below the minimum of 10000"
    )]
    fn test_error_display(#[case] error: EscrowError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::self_deal(EscrowError::self_deal("X", 1), ErrorKind::Validation)]
    #[case::banned(EscrowError::UserBanned { user: 1 }, ErrorKind::Validation)]
    #[case::already_paid(EscrowError::AlreadyPaid { deal_id: "X".into() }, ErrorKind::StateConflict)]
    #[case::seller_first(
        EscrowError::SellerHasNotConfirmed { deal_id: "X".into() },
        ErrorKind::StateConflict
    )]
    #[case::funds(
        EscrowError::insufficient_funds(1, Decimal::ZERO, Decimal::ONE),
        ErrorKind::Resource
    )]
    #[case::not_found(EscrowError::deal_not_found("X"), ErrorKind::Resource)]
    #[case::io(EscrowError::IoError { message: "disk".into() }, ErrorKind::Infrastructure)]
    fn test_error_kind(#[case] error: EscrowError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
    }

    #[test]
    fn test_only_infrastructure_errors_are_retryable() {
        assert!(ErrorKind::Infrastructure.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::StateConflict.is_retryable());
        assert!(!ErrorKind::Resource.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: EscrowError = io_error.into();
        assert!(matches!(error, EscrowError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
