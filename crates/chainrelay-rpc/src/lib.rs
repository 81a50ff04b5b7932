//! chainrelay-rpc — the node-RPC collaborator.
//!
//! Raw JSON-RPC wire types, the [`NodeClient`] trait consumed by the
//! iterator/orchestrator, and an HTTP implementation with retry/backoff.
//! The client tolerates steady polling; confirmation gating is the
//! iterator's job, not the client's.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::{HttpClientConfig, HttpNodeClient, NodeClient, NodeHashes};
pub use error::RpcError;
pub use retry::{RetryConfig, RetryPolicy};
pub use types::{BlockWithReceipts, RawBlock, RawLog, RawReceipt, RawTransaction};
