//! Iterator cursor — tracks the extractor's position in the chain.

use serde::{Deserialize, Serialize};

/// The block iterator's position and bounds.
///
/// The cursor knows:
/// - Which height to fetch next
/// - The (inclusive) end of the requested range
/// - The confirmation depth gating how close to head the walk may get
///
/// It advances monotonically, except when the orchestrator rewinds it after
/// a fork.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursor {
    /// Next block height to fetch.
    pub next_height: u64,
    /// Last block height to fetch (inclusive).
    pub end_height: u64,
    /// Minimum number of confirmations before a height may be fetched.
    pub confirmation_depth: u64,
}

impl Cursor {
    /// Create a cursor covering `[next_height, end_height]`.
    pub fn new(next_height: u64, end_height: u64, confirmation_depth: u64) -> Self {
        Self {
            next_height,
            end_height,
            confirmation_depth,
        }
    }

    /// Returns `true` if `head` is far enough ahead for `next_height` to be
    /// considered settled.
    pub fn is_confirmed(&self, head: u64) -> bool {
        head.saturating_sub(self.next_height) >= self.confirmation_depth
    }

    /// Consume the current height and move to the next one.
    pub fn advance(&mut self) {
        self.next_height += 1;
    }

    /// Returns `true` once the cursor has moved past `end_height`.
    pub fn finished(&self) -> bool {
        self.next_height > self.end_height
    }

    /// Reset the cursor to `height` (fork rewind).
    pub fn rewind(&mut self, height: u64) {
        self.next_height = height;
    }
}
