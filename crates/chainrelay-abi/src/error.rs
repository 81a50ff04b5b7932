//! Error types for ABI registration and decoding.

use thiserror::Error;

/// Errors that can occur while building the registry or decoding a single
/// transaction or log.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid ABI definition: {0}")]
    InvalidAbi(String),

    #[error("ABI decode failed for {kind}: {reason}")]
    AbiDecode { kind: String, reason: String },

    #[error("unexpected argument shape for {kind}: argument {index} is not {expected}")]
    ArgMismatch {
        kind: String,
        index: usize,
        expected: &'static str,
    },
}

impl From<DecodeError> for chainrelay_core::ExtractorError {
    fn from(err: DecodeError) -> Self {
        Self::Decode(err.to_string())
    }
}
