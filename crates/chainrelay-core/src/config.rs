//! Extractor configuration and fluent builder.

use serde::{Deserialize, Serialize};

/// Sentinel end height used when the configured range is unbounded.
pub const UNBOUNDED_END_BLOCK: u64 = 1_000_000_000;

/// Configuration for an extractor instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Master switch — a disabled extractor ignores `start()`.
    pub enabled: bool,
    /// First block to process when no prior block has been persisted.
    pub start_block: u64,
    /// Last block to process (inclusive). `0` means unbounded.
    pub end_block: u64,
    /// Number of blocks that must follow a block before it is processed.
    /// Typical values: 12 (Ethereum PoS), 64 (Ethereum safe), 1 (fast chains).
    pub confirmation_depth: u64,
    /// Deepest reorg the fork detector can rewind through.
    pub max_fork_depth: u64,
    /// Head polling interval while waiting for confirmations (milliseconds).
    pub poll_interval_ms: u64,
    /// Enable chatty per-transaction logging.
    pub debug: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_block: 0,
            end_block: 0,
            confirmation_depth: 12,
            max_fork_depth: 128,
            poll_interval_ms: 2000,
            debug: false,
        }
    }
}

impl ExtractorConfig {
    /// The end height with the unbounded sentinel applied.
    pub fn effective_end_block(&self) -> u64 {
        if self.end_block == 0 {
            UNBOUNDED_END_BLOCK
        } else {
            self.end_block
        }
    }
}

/// Fluent builder for [`ExtractorConfig`].
///
/// # Example
///
/// ```rust
/// use chainrelay_core::config::ExtractorConfigBuilder;
///
/// let config = ExtractorConfigBuilder::new()
///     .start_block(19_000_000)
///     .confirmation_depth(12)
///     .poll_interval_ms(500)
///     .build();
/// ```
#[derive(Default)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExtractorConfig::default(),
        }
    }

    /// Enable or disable the extractor.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the default start block.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = block;
        self
    }

    /// Set the end block (`0` = unbounded).
    pub fn end_block(mut self, block: u64) -> Self {
        self.config.end_block = block;
        self
    }

    /// Set the confirmation depth.
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.config.confirmation_depth = depth;
        self
    }

    /// Set the maximum supported reorg depth.
    pub fn max_fork_depth(mut self, depth: u64) -> Self {
        self.config.max_fork_depth = depth;
        self
    }

    /// Set the head polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Enable per-transaction debug logging.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ExtractorConfig {
        self.config
    }
}
