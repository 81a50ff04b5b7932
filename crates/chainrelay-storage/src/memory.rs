//! In-memory storage backend.
//!
//! Keeps blocks and fills in RAM. Useful for tests and short-lived relays
//! that don't need persistence; all data is lost when the process exits.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chainrelay_core::types::Block;

use crate::{FillRecord, RelayStore, StoreError};

/// In-memory relay storage.
#[derive(Default)]
pub struct MemoryStore {
    blocks: Mutex<BTreeMap<u64, Block>>,
    fills: Mutex<Vec<FillRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    /// The persisted block at `number`, if any.
    pub fn block_at(&self, number: u64) -> Option<Block> {
        self.blocks.lock().unwrap().get(&number).cloned()
    }

    /// All persisted fill rows, in insertion order.
    pub fn fills(&self) -> Vec<FillRecord> {
        self.fills.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .insert(block.number, block.clone());
        Ok(())
    }

    async fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .last_key_value()
            .map(|(_, block)| block.clone()))
    }

    async fn save_fill(&self, fill: &FillRecord) -> Result<(), StoreError> {
        self.fills.lock().unwrap().push(fill.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn block(number: u64, hash_byte: u8) -> Block {
        Block {
            number,
            hash: B256::repeat_byte(hash_byte),
            parent_hash: B256::repeat_byte(hash_byte.wrapping_sub(1)),
            timestamp: (number * 12) as i64,
        }
    }

    #[tokio::test]
    async fn latest_block_tracks_highest_height() {
        let store = MemoryStore::new();
        assert!(store.latest_block().await.unwrap().is_none());

        store.save_block(&block(100, 0xa0)).await.unwrap();
        store.save_block(&block(102, 0xa2)).await.unwrap();
        store.save_block(&block(101, 0xa1)).await.unwrap();

        let latest = store.latest_block().await.unwrap().unwrap();
        assert_eq!(latest.number, 102);
    }

    #[tokio::test]
    async fn save_block_is_idempotent_per_height() {
        let store = MemoryStore::new();
        store.save_block(&block(100, 0xa0)).await.unwrap();
        store.save_block(&block(100, 0xa0)).await.unwrap();
        assert_eq!(store.block_count(), 1);
    }

    #[tokio::test]
    async fn rewritten_height_is_last_write_wins() {
        let store = MemoryStore::new();
        store.save_block(&block(100, 0xa0)).await.unwrap();
        // Fork rewind: a different block arrives at the same height.
        store.save_block(&block(100, 0xb0)).await.unwrap();

        assert_eq!(store.block_count(), 1);
        assert_eq!(store.block_at(100).unwrap().hash, B256::repeat_byte(0xb0));
    }
}
