//! Raw wire types as returned by the node's JSON-RPC interface.
//!
//! Quantities arrive hex-encoded (`"0x12a05f200"`); hashes, addresses, and
//! byte strings deserialize straight into `alloy-primitives` types. The core
//! only ever reads these — they are owned by the RPC layer.

use alloy_primitives::{Address, Bytes, B256, U256};
use chainrelay_core::types::Block;
use serde::{Deserialize, Serialize};

/// Serde adapter for hex-encoded `u64` quantities.
pub mod hex_u64 {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{value:#x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid hex quantity: {s}")))
    }

    /// Parse a hex quantity (with or without `0x`).
    pub fn parse(s: &str) -> Option<u64> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        u64::from_str_radix(s, 16).ok()
    }
}

/// A block as returned by `eth_getBlockByNumber` with full transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(with = "hex_u64")]
    pub number: u64,
    pub hash: B256,
    #[serde(rename = "parentHash")]
    pub parent_hash: B256,
    #[serde(with = "hex_u64")]
    pub timestamp: u64,
    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

impl From<&RawBlock> for Block {
    fn from(raw: &RawBlock) -> Self {
        Self {
            number: raw.number,
            hash: raw.hash,
            parent_hash: raw.parent_hash,
            timestamp: raw.timestamp as i64,
        }
    }
}

/// A transaction, either mined (inside a [`RawBlock`]) or pending (from the
/// mempool feed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
    #[serde(with = "hex_u64")]
    pub gas: u64,
}

impl RawTransaction {
    /// The 4-byte method selector, if the input is long enough to carry one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        if self.input.len() < 4 {
            return None;
        }
        let mut selector = [0u8; 4];
        selector.copy_from_slice(&self.input[..4]);
        Some(selector)
    }
}

/// A transaction receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReceipt {
    #[serde(rename = "transactionHash")]
    pub transaction_hash: B256,
    #[serde(rename = "gasUsed", with = "hex_u64")]
    pub gas_used: u64,
    #[serde(with = "hex_u64")]
    pub status: u64,
    #[serde(default)]
    pub logs: Vec<RawLog>,
}

impl RawReceipt {
    /// Receipt status 1 means the transaction executed without reverting.
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

/// A single log entry inside a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(rename = "logIndex", with = "hex_u64")]
    pub log_index: u64,
}

impl RawLog {
    /// Topic 0 — the event signature hash, if present.
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// A fetched block paired with one receipt per transaction, in transaction
/// order.
#[derive(Debug, Clone)]
pub struct BlockWithReceipts {
    pub block: RawBlock,
    pub receipts: Vec<RawReceipt>,
}
