//! Confirmation-gated block iterator.
//!
//! Walks the chain sequentially, suspending until the node head is at least
//! `confirmation_depth` blocks past the next height. Transient node
//! failures are retried with backoff; exhausted retries surface as a fatal
//! error — the orchestrator terminates rather than skip a block, since a
//! silent skip would leave an undetectable gap in the emitted stream.
//!
//! The iterator only walks forward; fork detection is not its job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use chainrelay_core::cursor::Cursor;
use chainrelay_rpc::client::NodeClient;
use chainrelay_rpc::error::RpcError;
use chainrelay_rpc::retry::RetryPolicy;
use chainrelay_rpc::types::BlockWithReceipts;

/// Sequential, confirmation-delayed walk over chain blocks.
pub struct BlockIterator {
    node: Arc<dyn NodeClient>,
    cursor: Cursor,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl BlockIterator {
    pub fn new(
        node: Arc<dyn NodeClient>,
        start_height: u64,
        end_height: u64,
        confirmation_depth: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            node,
            cursor: Cursor::new(start_height, end_height, confirmation_depth),
            poll_interval,
            retry: RetryPolicy::default(),
        }
    }

    /// The height the next `next()` call will fetch.
    pub fn next_height(&self) -> u64 {
        self.cursor.next_height
    }

    /// Returns `true` once the walk has moved past the end height.
    pub fn finished(&self) -> bool {
        self.cursor.finished()
    }

    /// Fetch the next confirmed block with transactions and receipts.
    ///
    /// Suspends until the block at the cursor has enough confirmations.
    /// Returns `Ok(None)` if `shutdown` fires while waiting — the shutdown
    /// signal is only observed *between* polls, never by interrupting an
    /// in-flight node call. Fails once retries are exhausted on a transient
    /// error, or immediately on a non-transient one.
    pub async fn next(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<Option<BlockWithReceipts>, RpcError> {
        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }
            let head = self.head_with_retry().await?;
            if self.cursor.is_confirmed(head) {
                break;
            }
            tracing::debug!(
                next = self.cursor.next_height,
                head,
                depth = self.cursor.confirmation_depth,
                "waiting for confirmations"
            );
            tokio::time::sleep(self.poll_interval).await;
        }

        loop {
            if *shutdown.borrow() {
                return Ok(None);
            }
            match self.fetch_with_retry(self.cursor.next_height).await? {
                Some(fetched) => {
                    self.cursor.advance();
                    return Ok(Some(fetched));
                }
                // Confirmed by head number but not served yet — node lag.
                None => tokio::time::sleep(self.poll_interval).await,
            }
        }
    }

    async fn head_with_retry(&self) -> Result<u64, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.node.head_number().await {
                Ok(head) => return Ok(head),
                Err(err) => attempt = self.backoff_or_fail(attempt, err).await?,
            }
        }
    }

    async fn fetch_with_retry(&self, height: u64) -> Result<Option<BlockWithReceipts>, RpcError> {
        let mut attempt = 0u32;
        loop {
            match self.node.block_with_receipts(height).await {
                Ok(result) => return Ok(result),
                Err(err) => attempt = self.backoff_or_fail(attempt, err).await?,
            }
        }
    }

    /// Sleep per the retry schedule and return the bumped attempt counter,
    /// or give up: non-transient errors propagate as-is, exhausted retries
    /// as [`RpcError::RetriesExhausted`].
    async fn backoff_or_fail(&self, attempt: u32, err: RpcError) -> Result<u32, RpcError> {
        if !err.is_transient() {
            return Err(err);
        }
        let attempt = attempt + 1;
        match self.retry.next_delay(attempt) {
            Some(delay) => {
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient node failure in iterator, retrying"
                );
                tokio::time::sleep(delay).await;
                Ok(attempt)
            }
            None => Err(RpcError::RetriesExhausted {
                attempts: attempt,
                last: err.to_string(),
            }),
        }
    }
}
