//! Core business logic module
//!
//! This module contains the escrow components, leaf to root:
//! - `traits` - Trait seams (deal id generation)
//! - `ledger` - Balances and the journal; sole mutator of `User.balance`
//! - `deal_store` - Deal records and id uniqueness
//! - `engine` - Deal state machine coupling deal transitions to the ledger
//! - `withdrawal_queue` - Payout requests reserved against the ledger
//! - `admin` - Allowlisted admin shortcuts
//! - `service` - Facade wiring the above from an `EscrowConfig`
//! - `dispatcher` - Routes structured commands to core operations
//! - `batch_processor` - Concurrent replay of commands that share no state

pub mod admin;
pub mod batch_processor;
pub mod deal_store;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod service;
pub mod traits;
pub mod withdrawal_queue;

pub use admin::AdminOps;
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use deal_store::{DealStore, RandomDealIds};
pub use dispatcher::{CommandDispatcher, StateKey};
pub use engine::EscrowEngine;
pub use ledger::Ledger;
pub use service::{EscrowService, StateSnapshot};
pub use traits::DealIdGenerator;
pub use withdrawal_queue::WithdrawalQueue;
