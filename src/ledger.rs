// Thin re-export module: implementation is split between `ledger/block.rs`
// (block structure and canonical hashing) and `ledger/chain.rs` (append and
// full-chain validation).

pub mod block;
pub mod chain;

pub use block::{Block, Sha256Hash, GENESIS_HASH};
pub use chain::{Ledger, ValidationIssue, ValidationReport};
