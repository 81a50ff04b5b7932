//! Fork detection — parent-hash continuity check plus bounded ancestor walk.
//!
//! The detector keeps a sliding window of accepted `(height, hash,
//! parent_hash)` triples, sized to the maximum supported reorg depth. A
//! candidate whose parent hash matches the last accepted hash extends the
//! chain normally. Anything else is a fork: the detector walks the window
//! backward, asking the node for its current hash at each recorded height,
//! until it finds the first height where the node still agrees with what was
//! accepted. That height is the common ancestor; everything above it is
//! invalid and gets rewound by the orchestrator.

use std::collections::VecDeque;

use alloy_primitives::B256;
use async_trait::async_trait;

use crate::error::ExtractorError;
use crate::types::Block;

/// Hash-at-height lookup facet of the node-RPC collaborator.
///
/// The fork detector only ever needs this one query; the full client trait
/// lives in `chainrelay-rpc`.
#[async_trait]
pub trait ChainHashes: Send + Sync {
    /// Current canonical hash at `number`, or `None` if the node has no
    /// block there.
    async fn hash_at(&self, number: u64) -> Result<Option<B256>, ExtractorError>;
}

/// Describes a detected chain reorganization.
///
/// Transient: produced by the detector, consumed once by the orchestrator to
/// compute the restart height, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkEvent {
    /// Height of the last common ancestor — the canonical chain diverges
    /// immediately above this block.
    pub fork_block: u64,
    /// Height at which the divergence was noticed.
    pub detected_block: u64,
}

/// Detects chain reorganizations by parent-hash continuity.
pub struct ForkDetector {
    /// Accepted blocks, oldest first. Bounded by `max_depth`.
    window: VecDeque<Block>,
    /// Maximum reorg depth the detector can recover from.
    max_depth: usize,
}

impl ForkDetector {
    /// Create a detector able to rewind at most `max_depth` blocks.
    pub fn new(max_depth: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(max_depth),
            max_depth,
        }
    }

    /// The most recently accepted block, if any.
    pub fn last_accepted(&self) -> Option<&Block> {
        self.window.back()
    }

    /// Check `candidate` against the accepted chain.
    ///
    /// Returns `Ok(None)` and records the candidate when it extends the
    /// chain (or when no prior block has been recorded). Returns
    /// `Ok(Some(ForkEvent))` when the candidate diverges; in that case the
    /// candidate is *not* recorded — the orchestrator rewinds and refetches
    /// it on the new branch. Fails with [`ExtractorError::ForkDepthExceeded`]
    /// if no common ancestor exists within the window.
    pub async fn detect(
        &mut self,
        candidate: &Block,
        hashes: &dyn ChainHashes,
    ) -> Result<Option<ForkEvent>, ExtractorError> {
        let last = match self.window.back() {
            None => {
                self.accept(candidate);
                return Ok(None);
            }
            Some(last) => last,
        };

        if candidate.extends(last) {
            self.accept(candidate);
            return Ok(None);
        }

        let detected_block = candidate.number;
        tracing::warn!(
            at = detected_block,
            expected_parent = %last.hash,
            got_parent = %candidate.parent_hash,
            "parent hash mismatch, walking back to common ancestor"
        );

        // Walk the accepted window newest-first, comparing our recorded hash
        // at each height against what the node reports there now. The first
        // height where both still agree is the common ancestor.
        let mut fork_block = None;
        for recorded in self.window.iter().rev() {
            if let Some(hash) = hashes.hash_at(recorded.number).await? {
                if hash == recorded.hash {
                    fork_block = Some(recorded.number);
                    break;
                }
            }
        }

        let Some(fork_block) = fork_block else {
            return Err(ExtractorError::ForkDepthExceeded {
                detected_block,
                max_depth: self.max_depth as u64,
            });
        };

        while self.window.back().map_or(false, |b| b.number > fork_block) {
            self.window.pop_back();
        }
        Ok(Some(ForkEvent {
            fork_block,
            detected_block,
        }))
    }

    fn accept(&mut self, block: &Block) {
        if self.window.len() >= self.max_depth {
            self.window.pop_front();
        }
        self.window.push_back(block.clone());
    }
}
