//! Trait seams of the escrow core

use crate::types::DealId;

/// Source of public deal identifiers
///
/// Ids only need to be hard to guess and short enough to share; uniqueness is
/// enforced by the deal store, which asks for another id on collision.
pub trait DealIdGenerator: Send + Sync {
    fn next_id(&self) -> DealId;
}
