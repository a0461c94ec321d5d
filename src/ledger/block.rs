use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// `previous_hash` of the first block in the chain. A fixed constant rather
/// than a computed link.
pub const GENESIS_HASH: Sha256Hash = [0u8; 32];

/// One ledger record, linking a single transaction to the hash of its
/// predecessor. Blocks are append-only: once written they are never edited,
/// reordered, or removed, and any after-the-fact mutation is caught by
/// [`crate::ledger::Ledger::validate`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    /// 0-based, strictly sequential position in the chain.
    pub index: u64,
    /// The transaction this block commits to.
    pub transaction_id: String,
    pub previous_hash: Sha256Hash,
    pub current_hash: Sha256Hash,
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp: i64,
}

impl Block {
    pub fn new(index: u64, transaction_id: String, previous_hash: Sha256Hash, timestamp: i64) -> Self {
        let current_hash = Self::compute_hash(&transaction_id, &previous_hash, timestamp);
        Block {
            index,
            transaction_id,
            previous_hash,
            current_hash,
            timestamp,
        }
    }

    /// Canonical digest over `transaction_id || previous_hash || timestamp`.
    /// Field order is fixed; the timestamp is serialized as little-endian
    /// bytes so the input is unambiguous.
    pub fn compute_hash(transaction_id: &str, previous_hash: &Sha256Hash, timestamp: i64) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update(transaction_id.as_bytes());
        hasher.update(previous_hash);
        hasher.update(timestamp.to_le_bytes());
        hasher.finalize().into()
    }

    /// Recompute the digest from the stored fields and compare it to the
    /// stored `current_hash`.
    pub fn hash_matches(&self) -> bool {
        Self::compute_hash(&self.transaction_id, &self.previous_hash, self.timestamp) == self.current_hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.current_hash)
    }
}
