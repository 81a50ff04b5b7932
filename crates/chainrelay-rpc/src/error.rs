//! Error types for the node-RPC client.

use thiserror::Error;

/// Errors that can occur while talking to the node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Network-level failure — connection refused, timeout, TLS. Transient;
    /// the caller may retry.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("node returned error {code}: {message}")]
    Node { code: i64, message: String },

    /// The node's response did not have the expected shape.
    #[error("malformed response for {method}: {reason}")]
    Malformed { method: String, reason: String },

    /// All retries were consumed without a successful response.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl RpcError {
    /// Returns `true` if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<RpcError> for chainrelay_core::ExtractorError {
    fn from(err: RpcError) -> Self {
        Self::Rpc(err.to_string())
    }
}
