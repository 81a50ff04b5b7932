//! chainrelay-storage — the persistence collaborator.
//!
//! The extractor only needs a narrow surface: upsert a block, find the
//! latest persisted block (startup resume), and record order fills. Blocks
//! are keyed by height with last-write-wins semantics, so re-persisting
//! after a fork rewind simply overwrites the invalidated record.

use async_trait::async_trait;
use thiserror::Error;

use chainrelay_abi::events::FillEvent;
use chainrelay_core::types::Block;

#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<StoreError> for chainrelay_core::ExtractorError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// A persisted order-fill row, converted from a decoded fill event.
///
/// Hashes, addresses, and amounts are stored in string form so any backend
/// can hold them without chain-specific column types.
#[derive(Debug, Clone, PartialEq)]
pub struct FillRecord {
    pub ring_hash: String,
    pub order_hash: String,
    pub owner: String,
    pub token_s: String,
    pub token_b: String,
    pub amount_s: String,
    pub amount_b: String,
    pub fee: String,
    pub tx_hash: String,
    pub block_number: u64,
    pub log_index: u64,
    /// Unix timestamp of when this record was created.
    pub saved_at: i64,
}

impl FillRecord {
    /// Convert a decoded fill event into its storage row.
    pub fn from_event(fill: &FillEvent) -> Self {
        Self {
            ring_hash: format!("{:#x}", fill.ring_hash),
            order_hash: format!("{:#x}", fill.order_hash),
            owner: format!("{:#x}", fill.owner),
            token_s: format!("{:#x}", fill.token_s),
            token_b: format!("{:#x}", fill.token_b),
            amount_s: fill.amount_s.to_string(),
            amount_b: fill.amount_b.to_string(),
            fee: fill.fee.to_string(),
            tx_hash: format!("{:#x}", fill.meta.tx_hash),
            block_number: fill.meta.block_number.unwrap_or(0),
            log_index: fill.meta.log_index.unwrap_or(0),
            saved_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Storage interface consumed by the extraction orchestrator.
#[async_trait]
pub trait RelayStore: Send + Sync {
    /// Persist a block, overwriting any existing record at the same height.
    async fn save_block(&self, block: &Block) -> Result<(), StoreError>;

    /// The highest persisted block, or `None` on first run.
    async fn latest_block(&self) -> Result<Option<Block>, StoreError>;

    /// Persist an order-fill row.
    async fn save_fill(&self, fill: &FillRecord) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use chainrelay_abi::events::EventMeta;
    use chainrelay_core::types::TxStatus;

    #[test]
    fn fill_record_from_event() {
        let fill = FillEvent {
            ring_hash: B256::repeat_byte(0xaa),
            order_hash: B256::repeat_byte(0xbb),
            owner: Address::repeat_byte(0x11),
            token_s: Address::repeat_byte(0x20),
            token_b: Address::repeat_byte(0x57),
            amount_s: U256::from(500u64),
            amount_b: U256::from(700u64),
            fee: U256::from(3u64),
            meta: EventMeta {
                tx_hash: B256::repeat_byte(0xcc),
                block_number: Some(19_000_000),
                block_time: 1_700_000_000,
                log_index: Some(2),
                gas_used: Some(90_000),
                status: TxStatus::Success,
                pending: false,
            },
        };

        let record = FillRecord::from_event(&fill);
        assert_eq!(record.block_number, 19_000_000);
        assert_eq!(record.log_index, 2);
        assert_eq!(record.amount_s, "500");
        assert!(record.order_hash.starts_with("0x"));
        assert_eq!(record.order_hash.len(), 66);
    }
}
