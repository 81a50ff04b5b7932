//! chainrelay-core — foundation for the chain extraction pipeline.
//!
//! # Architecture
//!
//! ```text
//! ExtractorService → BlockIterator  (confirmation-gated walk, owns the Cursor)
//!                  → ForkDetector   (parent-hash continuity + bounded rewind)
//!                  → AbiRegistry    (known contract method/event decoding)
//!                  → EventBus       (ordered, typed event emission)
//! ```
//!
//! This crate holds the pieces with no dependency on the orchestrator: the
//! domain types, the iterator cursor, the fork detector, the configuration
//! surface, and the error taxonomy.

pub mod config;
pub mod cursor;
pub mod error;
pub mod fork;
pub mod types;

pub use config::{ExtractorConfig, ExtractorConfigBuilder, UNBOUNDED_END_BLOCK};
pub use cursor::Cursor;
pub use error::ExtractorError;
pub use fork::{ChainHashes, ForkDetector, ForkEvent};
pub use types::{Block, TxStatus};
