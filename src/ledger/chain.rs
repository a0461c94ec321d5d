use serde::Serialize;

use crate::ledger::block::{Block, Sha256Hash, GENESIS_HASH};

/// Append-only, strictly ordered sequence of blocks: single-writer, one block
/// per transaction. The `Ledger` itself is not synchronized; callers serialize
/// appends (see `TransactionStore`, which funnels every append through one
/// write lock).
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    blocks: Vec<Block>,
}

/// One finding from a full-chain validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub index: u64,
    pub reason: String,
}

/// Complete tamper report for a chain. `valid` is true iff `errors` is empty;
/// validation never stops at the first discrepancy.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub total_blocks: usize,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from previously persisted blocks. The blocks are
    /// taken as-is; run [`Ledger::validate`] afterwards to detect tampering
    /// with the stored records.
    pub fn from_blocks(mut blocks: Vec<Block>) -> Self {
        blocks.sort_by_key(|b| b.index);
        Ledger { blocks }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hash the next appended block must link to.
    pub fn tip_hash(&self) -> Sha256Hash {
        self.blocks.last().map_or(GENESIS_HASH, |b| b.current_hash)
    }

    /// Append a block committing to `transaction_id`. Reads the current tip,
    /// links the new block to it, and pushes it with the next sequential
    /// index. Infallible under well-formed input and never rewrites existing
    /// blocks; callers must hold the single append lock so two submissions
    /// cannot link to the same tip.
    pub fn append_block(&mut self, transaction_id: &str, timestamp: i64) -> Block {
        let previous_hash = self.tip_hash();
        let index = self.blocks.len() as u64;
        let block = Block::new(index, transaction_id.to_string(), previous_hash, timestamp);
        self.blocks.push(block.clone());
        block
    }

    pub fn block_for_transaction(&self, transaction_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.transaction_id == transaction_id)
    }

    /// Walk the full chain once, recomputing every block's digest from its
    /// stored fields and checking each link to its successor. Collects every
    /// failing index rather than stopping early, so one pass yields a
    /// complete tamper report.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if let Some(first) = self.blocks.first() {
            if first.previous_hash != GENESIS_HASH {
                errors.push(ValidationIssue {
                    index: first.index,
                    reason: "broken link between genesis and block 0".to_string(),
                });
            }
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if block.index != i as u64 {
                errors.push(ValidationIssue {
                    index: block.index,
                    reason: format!("unexpected index {} at position {}", block.index, i),
                });
            }

            if !block.hash_matches() {
                errors.push(ValidationIssue {
                    index: block.index,
                    reason: format!("hash mismatch at block {}", block.index),
                });
            }

            if i > 0 {
                let prev = &self.blocks[i - 1];
                if block.previous_hash != prev.current_hash {
                    errors.push(ValidationIssue {
                        index: block.index,
                        reason: format!("broken link between block {} and {}", prev.index, block.index),
                    });
                }
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            total_blocks: self.blocks.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_chain(n: usize) -> Ledger {
        let mut ledger = Ledger::new();
        for i in 0..n {
            ledger.append_block(&format!("TX-{}", i), 1_700_000_000_000 + i as i64);
        }
        ledger
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = Ledger::new().validate();
        assert!(report.valid);
        assert_eq!(report.total_blocks, 0);
    }

    #[test]
    fn appended_chain_is_valid_and_linked() {
        let ledger = build_chain(5);
        let report = ledger.validate();
        assert!(report.valid, "unexpected errors: {:?}", report.errors);
        assert_eq!(report.total_blocks, 5);

        let blocks = ledger.blocks();
        assert_eq!(blocks[0].previous_hash, GENESIS_HASH);
        for i in 1..blocks.len() {
            assert_eq!(blocks[i].previous_hash, blocks[i - 1].current_hash);
            assert_eq!(blocks[i].index, i as u64);
        }
    }

    #[test]
    fn tampered_transaction_id_is_reported_at_its_index() {
        let ledger = build_chain(4);
        let mut blocks = ledger.blocks().to_vec();
        blocks[2].transaction_id = "TX-rewritten".to_string();

        let report = Ledger::from_blocks(blocks).validate();
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.index == 2 && e.reason == "hash mismatch at block 2"));
    }

    #[test]
    fn tampered_timestamp_is_reported() {
        let ledger = build_chain(3);
        let mut blocks = ledger.blocks().to_vec();
        blocks[1].timestamp += 1;

        let report = Ledger::from_blocks(blocks).validate();
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.index == 1));
    }

    #[test]
    fn tampered_current_hash_breaks_block_and_link() {
        let ledger = build_chain(3);
        let mut blocks = ledger.blocks().to_vec();
        blocks[1].current_hash = [0xAB; 32];

        let report = Ledger::from_blocks(blocks).validate();
        assert!(!report.valid);
        // Both the block itself and the link to its successor fail.
        assert!(report
            .errors
            .iter()
            .any(|e| e.reason == "hash mismatch at block 1"));
        assert!(report
            .errors
            .iter()
            .any(|e| e.reason == "broken link between block 1 and 2"));
    }

    #[test]
    fn validation_collects_every_failure() {
        let ledger = build_chain(6);
        let mut blocks = ledger.blocks().to_vec();
        blocks[1].transaction_id = "TX-a".to_string();
        blocks[4].transaction_id = "TX-b".to_string();

        let report = Ledger::from_blocks(blocks).validate();
        let failing: Vec<u64> = report.errors.iter().map(|e| e.index).collect();
        assert!(failing.contains(&1));
        assert!(failing.contains(&4));
    }

    #[test]
    fn non_genesis_anchor_is_reported() {
        let ledger = build_chain(2);
        let mut blocks = ledger.blocks().to_vec();
        // Rewrite block 0 consistently (fields and hash) but anchored wrong.
        blocks[0] = Block::new(0, "TX-0".to_string(), [7u8; 32], blocks[0].timestamp);

        let report = Ledger::from_blocks(blocks).validate();
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.index == 0 && e.reason.contains("genesis")));
    }

    #[test]
    fn block_lookup_by_transaction() {
        let ledger = build_chain(3);
        let block = ledger.block_for_transaction("TX-1").unwrap();
        assert_eq!(block.index, 1);
        assert!(ledger.block_for_transaction("TX-missing").is_none());
    }
}
