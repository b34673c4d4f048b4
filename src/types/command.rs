//! Structured commands issued by the chat layer
//!
//! Each command is fully assembled before it reaches the core; the core never
//! parses free text. `deal` fields hold either a script-local alias or a
//! literal deal id, resolved by the dispatcher.

use super::deal::Currency;
use super::user::UserId;
use super::withdrawal::WithdrawalId;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Register {
        user: UserId,
        username: Option<String>,
    },
    SetRequisites {
        user: UserId,
        requisites: String,
    },
    CreateDeal {
        user: UserId,
        alias: Option<String>,
        product_info: String,
        currency: Currency,
        amount: Decimal,
    },
    JoinDeal {
        user: UserId,
        deal: String,
    },
    Pay {
        user: UserId,
        deal: String,
    },
    ConfirmDelivery {
        user: UserId,
        deal: String,
    },
    ConfirmReceipt {
        user: UserId,
        deal: String,
    },
    /// Admin only
    CancelDeal {
        user: UserId,
        deal: String,
    },
    Withdraw {
        user: UserId,
        amount: Decimal,
        destination: Option<String>,
    },
    /// Admin only; `id` is the withdrawal request id
    ProcessWithdrawal {
        user: UserId,
        id: WithdrawalId,
    },
    /// Admin only; refunds the reserved amount
    RejectWithdrawal {
        user: UserId,
        id: WithdrawalId,
    },
    GrantBalance {
        user: UserId,
        target: UserId,
        amount: Decimal,
    },
    GrantUnlimited {
        user: UserId,
        target: UserId,
    },
    Ban {
        user: UserId,
        target: UserId,
    },
    Unban {
        user: UserId,
        target: UserId,
    },
}

impl Command {
    /// The user issuing the command
    pub fn user(&self) -> UserId {
        match self {
            Command::Register { user, .. }
            | Command::SetRequisites { user, .. }
            | Command::CreateDeal { user, .. }
            | Command::JoinDeal { user, .. }
            | Command::Pay { user, .. }
            | Command::ConfirmDelivery { user, .. }
            | Command::ConfirmReceipt { user, .. }
            | Command::CancelDeal { user, .. }
            | Command::Withdraw { user, .. }
            | Command::ProcessWithdrawal { user, .. }
            | Command::RejectWithdrawal { user, .. }
            | Command::GrantBalance { user, .. }
            | Command::GrantUnlimited { user, .. }
            | Command::Ban { user, .. }
            | Command::Unban { user, .. } => *user,
        }
    }

    /// Command name as written in command files
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::SetRequisites { .. } => "requisites",
            Command::CreateDeal { .. } => "create",
            Command::JoinDeal { .. } => "join",
            Command::Pay { .. } => "pay",
            Command::ConfirmDelivery { .. } => "confirm_delivery",
            Command::ConfirmReceipt { .. } => "confirm_receipt",
            Command::CancelDeal { .. } => "cancel",
            Command::Withdraw { .. } => "withdraw",
            Command::ProcessWithdrawal { .. } => "process_withdrawal",
            Command::RejectWithdrawal { .. } => "reject_withdrawal",
            Command::GrantBalance { .. } => "grant",
            Command::GrantUnlimited { .. } => "grant_unlimited",
            Command::Ban { .. } => "ban",
            Command::Unban { .. } => "unban",
        }
    }
}
