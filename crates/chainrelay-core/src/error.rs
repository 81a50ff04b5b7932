//! Error taxonomy for the extraction pipeline.
//!
//! Fatal conditions stop the service: an unrecoverable node-RPC failure, a
//! transaction-count cross-check mismatch, or a fork deeper than the
//! supported rewind window. A single undecodable transaction or log is never
//! fatal — the orchestrator logs it and moves on. Fork detection itself is
//! not an error at all; it is a control condition carried by
//! [`crate::fork::ForkEvent`].

use thiserror::Error;

/// Errors that can occur while driving the extraction loop.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("node RPC error: {0}")]
    Rpc(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error(
        "transaction count mismatch at block {number}: node reports {reported}, block carries {actual}"
    )]
    TxCountMismatch {
        number: u64,
        reported: usize,
        actual: usize,
    },

    #[error("no fork ancestor found within {max_depth} blocks below {detected_block}")]
    ForkDepthExceeded { detected_block: u64, max_depth: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}
