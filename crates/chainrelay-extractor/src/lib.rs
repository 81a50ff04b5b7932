//! chainrelay-extractor — the extraction orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ExtractorService
//!     ├── BlockIterator   confirmation-gated walk over NodeClient
//!     ├── ForkDetector    parent-hash continuity, bounded rewind
//!     ├── AbiRegistry     method/event recognition and decoding
//!     ├── RelayStore      block + fill persistence
//!     └── EventBus        ordered, typed emission to downstream consumers
//! ```
//!
//! The service owns the only lifecycle in the pipeline: `start()` spawns
//! one block worker (the ordered per-block loop) and one pending worker
//! (serialized mempool decoding); `stop()` signals both through a shutdown
//! channel allocated fresh for each start.

pub mod bus;
pub mod iterator;
pub mod pending;
pub mod service;

pub use bus::{BlockNotice, EventBus, EventSubscription, SyncNotice};
pub use iterator::BlockIterator;
pub use service::ExtractorService;
