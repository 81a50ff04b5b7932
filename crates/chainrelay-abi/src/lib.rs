//! chainrelay-abi — the ABI processor.
//!
//! Built once at startup from the known contract addresses and their ABI
//! definitions. During steady-state operation it answers two questions for
//! the orchestrator — does this transaction call a known method? does this
//! receipt carry a known event? — and decodes the matches into a closed set
//! of typed [`ChainEvent`] variants.
//!
//! Unknown selectors and topics are not errors: the corresponding
//! transaction/log simply is not ours. A *malformed* payload under a
//! registered signature is a [`DecodeError`], which the orchestrator logs
//! and skips without aborting the rest of the block.

pub mod error;
pub mod events;
pub mod registry;

pub use error::DecodeError;
pub use events::{ChainEvent, EventKind, EventMeta};
pub use registry::{AbiRegistry, ContractSet};
