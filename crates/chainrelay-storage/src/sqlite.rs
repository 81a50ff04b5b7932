//! SQLite storage backend.
//!
//! Persists blocks and fills to a single SQLite file using `sqlx` with WAL
//! mode. Blocks are upserted by height, which makes fork-rewind
//! re-persistence a plain overwrite.
//!
//! # Usage
//! ```rust,no_run
//! use chainrelay_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./relay.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use alloy_primitives::B256;
use chainrelay_core::types::Block;

use crate::{FillRecord, RelayStore, StoreError};

/// SQLite-backed relay storage.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./relay.db"`) or a full SQLite
    /// URL (`"sqlite:./relay.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. All data is lost when the pool is
    /// dropped.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                number      INTEGER PRIMARY KEY,
                hash        TEXT    NOT NULL,
                parent_hash TEXT    NOT NULL,
                timestamp   INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fills (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                ring_hash    TEXT    NOT NULL,
                order_hash   TEXT    NOT NULL,
                owner        TEXT    NOT NULL,
                token_s      TEXT    NOT NULL,
                token_b      TEXT    NOT NULL,
                amount_s     TEXT    NOT NULL,
                amount_b     TEXT    NOT NULL,
                fee          TEXT    NOT NULL,
                tx_hash      TEXT    NOT NULL,
                block_number INTEGER NOT NULL,
                log_index    INTEGER NOT NULL,
                saved_at     INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_fills_order ON fills(order_hash);")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

fn parse_hash(s: &str) -> Result<B256, StoreError> {
    s.parse::<B256>()
        .map_err(|e| StoreError::Corrupt(format!("bad hash {s}: {e}")))
}

#[async_trait]
impl RelayStore for SqliteStore {
    async fn save_block(&self, block: &Block) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO blocks (number, hash, parent_hash, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(number) DO UPDATE SET
                 hash = excluded.hash,
                 parent_hash = excluded.parent_hash,
                 timestamp = excluded.timestamp;",
        )
        .bind(block.number as i64)
        .bind(format!("{:#x}", block.hash))
        .bind(format!("{:#x}", block.parent_hash))
        .bind(block.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn latest_block(&self) -> Result<Option<Block>, StoreError> {
        let row = sqlx::query(
            "SELECT number, hash, parent_hash, timestamp
             FROM blocks ORDER BY number DESC LIMIT 1;",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Block {
            number: row.get::<i64, _>("number") as u64,
            hash: parse_hash(row.get::<&str, _>("hash"))?,
            parent_hash: parse_hash(row.get::<&str, _>("parent_hash"))?,
            timestamp: row.get::<i64, _>("timestamp"),
        }))
    }

    async fn save_fill(&self, fill: &FillRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO fills
                (ring_hash, order_hash, owner, token_s, token_b,
                 amount_s, amount_b, fee, tx_hash, block_number, log_index, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        )
        .bind(&fill.ring_hash)
        .bind(&fill.order_hash)
        .bind(&fill.owner)
        .bind(&fill.token_s)
        .bind(&fill.token_b)
        .bind(&fill.amount_s)
        .bind(&fill.amount_b)
        .bind(&fill.fee)
        .bind(&fill.tx_hash)
        .bind(fill.block_number as i64)
        .bind(fill.log_index as i64)
        .bind(fill.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64, hash_byte: u8) -> Block {
        Block {
            number,
            hash: B256::repeat_byte(hash_byte),
            parent_hash: B256::repeat_byte(hash_byte.wrapping_sub(1)),
            timestamp: (number * 12) as i64,
        }
    }

    #[tokio::test]
    async fn block_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.latest_block().await.unwrap().is_none());

        store.save_block(&block(100, 0xa0)).await.unwrap();
        store.save_block(&block(101, 0xa1)).await.unwrap();

        let latest = store.latest_block().await.unwrap().unwrap();
        assert_eq!(latest.number, 101);
        assert_eq!(latest.hash, B256::repeat_byte(0xa1));
    }

    #[tokio::test]
    async fn upsert_overwrites_same_height() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.save_block(&block(100, 0xa0)).await.unwrap();
        store.save_block(&block(100, 0xb0)).await.unwrap();

        let latest = store.latest_block().await.unwrap().unwrap();
        assert_eq!(latest.number, 100);
        assert_eq!(latest.hash, B256::repeat_byte(0xb0));
    }

    #[tokio::test]
    async fn fill_insert_succeeds() {
        let store = SqliteStore::in_memory().await.unwrap();
        let fill = FillRecord {
            ring_hash: "0xaa".into(),
            order_hash: "0xbb".into(),
            owner: "0x11".into(),
            token_s: "0x20".into(),
            token_b: "0x57".into(),
            amount_s: "500".into(),
            amount_b: "700".into(),
            fee: "3".into(),
            tx_hash: "0xcc".into(),
            block_number: 19_000_000,
            log_index: 2,
            saved_at: 1_700_000_000,
        };
        store.save_fill(&fill).await.unwrap();
    }
}
