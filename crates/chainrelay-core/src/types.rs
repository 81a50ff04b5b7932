//! Shared domain types for the extraction pipeline.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// A canonical-chain block as tracked by the extractor.
///
/// Immutable once accepted; exactly one per height on the canonical branch.
/// Superseded only by a fork rewind, in which case the replacement block is
/// persisted over the old record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
}

impl Block {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &Block) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

/// Execution status attached to every recognized method/event emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// The transaction executed successfully (receipt status 1).
    Success,
    /// The transaction reverted (receipt status 0).
    Failed,
    /// No receipt yet — the transaction was observed in the mempool.
    Pending,
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Pending => write!(f, "pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_extends_parent() {
        let parent = Block {
            number: 100,
            hash: B256::repeat_byte(0xaa),
            parent_hash: B256::ZERO,
            timestamp: 1000,
        };
        let child = Block {
            number: 101,
            hash: B256::repeat_byte(0xbb),
            parent_hash: parent.hash,
            timestamp: 1012,
        };
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn block_extends_false_on_gap() {
        let a = Block {
            number: 100,
            hash: B256::repeat_byte(0xaa),
            parent_hash: B256::ZERO,
            timestamp: 1000,
        };
        let b = Block {
            number: 102, // gap
            hash: B256::repeat_byte(0xcc),
            parent_hash: a.hash,
            timestamp: 1024,
        };
        assert!(!b.extends(&a));
    }

    #[test]
    fn block_serde_roundtrip() {
        let block = Block {
            number: 19_000_000,
            hash: B256::repeat_byte(0xaa),
            parent_hash: B256::repeat_byte(0xab),
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);
    }
}
