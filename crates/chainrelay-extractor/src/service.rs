//! The extraction orchestrator — the only component with a lifecycle.
//!
//! `start()` resolves the resume height from storage, allocates a fresh
//! shutdown channel, and spawns the block worker and the pending worker.
//! The block worker drives the per-block procedure:
//!
//! 1. fetch the next confirmed block (fatal on unrecoverable fetch error)
//! 2. persist it
//! 3. until sync is complete, compare against the live head and emit the
//!    one-time sync-complete notification once caught up
//! 4. run fork detection; on a fork, emit the fork notification, rewind the
//!    start height to `fork_block + 1`, and restart the loop — the inner
//!    loop has fully exited before the next generation begins
//! 5. emit block-started
//! 6. cross-check the transaction count against the node (mismatch fatal)
//! 7. decode and emit every transaction in order: recognized events first,
//!    then recognized method calls, then the plain transfer fallback
//! 8. emit block-ended
//!
//! Each `start()` uses a freshly allocated `watch` channel, so a stale stop
//! signal from a previous generation can never terminate a later one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use chainrelay_abi::events::{ChainEvent, EventMeta};
use chainrelay_abi::registry::AbiRegistry;
use chainrelay_core::config::ExtractorConfig;
use chainrelay_core::fork::ForkDetector;
use chainrelay_core::types::Block;
use chainrelay_core::ExtractorError;
use chainrelay_rpc::client::{NodeClient, NodeHashes};
use chainrelay_rpc::types::{RawReceipt, RawTransaction};
use chainrelay_storage::{FillRecord, RelayStore};

use crate::bus::{BlockNotice, EventBus, SyncNotice};
use crate::iterator::BlockIterator;
use crate::pending::PendingWorker;

/// The extraction service. Composes the iterator, the fork detector, the
/// ABI registry, storage, and the event bus.
pub struct ExtractorService {
    config: ExtractorConfig,
    node: Arc<dyn NodeClient>,
    store: Arc<dyn RelayStore>,
    registry: Arc<AbiRegistry>,
    bus: Arc<EventBus>,
    shutdown: Option<watch::Sender<bool>>,
    block_worker: Option<JoinHandle<Result<(), ExtractorError>>>,
    pending_worker: Option<JoinHandle<()>>,
    sync_complete: Arc<AtomicBool>,
}

impl ExtractorService {
    pub fn new(
        config: ExtractorConfig,
        node: Arc<dyn NodeClient>,
        store: Arc<dyn RelayStore>,
        registry: Arc<AbiRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            node,
            store,
            registry,
            bus,
            shutdown: None,
            block_worker: None,
            pending_worker: None,
            sync_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the extraction workers. No-op if the service is disabled by
    /// configuration or already running.
    pub async fn start(&mut self) -> Result<(), ExtractorError> {
        if !self.config.enabled {
            tracing::info!("extractor disabled by configuration");
            return Ok(());
        }
        if self.shutdown.is_some() {
            tracing::warn!("extractor already running");
            return Ok(());
        }

        let start_height = self.resolve_start_height().await?;
        tracing::info!(start = start_height, "extractor starting");

        self.sync_complete.store(false, Ordering::Release);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = BlockWorker {
            config: self.config.clone(),
            node: Arc::clone(&self.node),
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            bus: Arc::clone(&self.bus),
            sync_complete: Arc::clone(&self.sync_complete),
            shutdown: shutdown_rx.clone(),
            start_height,
            detector: ForkDetector::new(self.config.max_fork_depth as usize),
        };
        self.block_worker = Some(tokio::spawn(worker.run()));

        let pending = PendingWorker {
            registry: Arc::clone(&self.registry),
            bus: Arc::clone(&self.bus),
            feed: self.bus.subscribe_pending(),
            shutdown: shutdown_rx,
            debug: self.config.debug,
        };
        self.pending_worker = Some(tokio::spawn(pending.run()));

        self.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Signal the workers to stop and wait for them to exit. The signal is
    /// consumed at iteration boundaries; in-flight fetch and emit calls run
    /// to completion first.
    pub async fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        let _ = shutdown.send(true);

        if let Some(handle) = self.block_worker.take() {
            match handle.await {
                Ok(Ok(())) | Err(_) => {}
                Ok(Err(err)) => tracing::error!(error = %err, "block worker exited with error"),
            }
        }
        if let Some(handle) = self.pending_worker.take() {
            let _ = handle.await;
        }
        tracing::info!("extractor stopped");
    }

    /// Wait for the block worker to finish and return its outcome. Resolves
    /// when the configured end height is reached or a fatal error occurs.
    pub async fn wait(&mut self) -> Result<(), ExtractorError> {
        let Some(handle) = self.block_worker.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(err) => Err(ExtractorError::Internal(format!("block worker panicked: {err}"))),
        }
    }

    /// Returns `true` while the service is started.
    pub fn running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Returns `true` once the walk has caught up with the node head. Safe
    /// to call from health checks on any thread.
    pub fn sync_complete(&self) -> bool {
        self.sync_complete.load(Ordering::Acquire)
    }

    /// The height to resume from: the latest persisted block if one exists,
    /// otherwise the configured start height.
    async fn resolve_start_height(&self) -> Result<u64, ExtractorError> {
        match self.store.latest_block().await? {
            Some(latest) => {
                tracing::debug!(
                    configured = self.config.start_block,
                    resumed = latest.number,
                    "resuming from latest persisted block"
                );
                Ok(latest.number)
            }
            None => Ok(self.config.start_block),
        }
    }
}

/// The single worker driving the ordered per-block loop.
struct BlockWorker {
    config: ExtractorConfig,
    node: Arc<dyn NodeClient>,
    store: Arc<dyn RelayStore>,
    registry: Arc<AbiRegistry>,
    bus: Arc<EventBus>,
    sync_complete: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
    start_height: u64,
    detector: ForkDetector,
}

impl BlockWorker {
    async fn run(mut self) -> Result<(), ExtractorError> {
        match self.drive().await {
            Ok(()) => {
                tracing::info!("extraction loop exited");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "extraction loop terminated");
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), ExtractorError> {
        let hashes = NodeHashes(Arc::clone(&self.node));
        let end_height = self.config.effective_end_block();

        // One iteration per generation; a fork rewind exits the inner loop
        // and restarts here with a fresh iterator at the rewound height.
        loop {
            let mut iterator = BlockIterator::new(
                Arc::clone(&self.node),
                self.start_height,
                end_height,
                self.config.confirmation_depth,
                Duration::from_millis(self.config.poll_interval_ms),
            );
            tracing::info!(start = self.start_height, "extraction loop starting");

            let restart = loop {
                let fetched = match iterator.next(&self.shutdown).await {
                    Ok(Some(fetched)) => fetched,
                    Ok(None) => return Ok(()),
                    Err(err) => return Err(err.into()),
                };
                let block = Block::from(&fetched.block);
                tracing::info!(
                    number = block.number,
                    hash = %block.hash,
                    txs = fetched.block.transactions.len(),
                    "processing block"
                );

                self.store.save_block(&block).await?;

                if !self.sync_complete.load(Ordering::Acquire) {
                    self.check_sync(block.number).await?;
                }

                if let Some(fork) = self.detector.detect(&block, &hashes).await? {
                    tracing::warn!(
                        fork_block = fork.fork_block,
                        detected_block = fork.detected_block,
                        "chain fork detected, rewinding"
                    );
                    self.start_height = fork.fork_block + 1;
                    self.bus.publish_fork(fork);
                    break true;
                }

                let notice = BlockNotice {
                    number: block.number,
                    hash: block.hash,
                };
                self.bus.publish_block_started(notice.clone());

                let reported = self
                    .node
                    .transaction_count_by_hash(block.hash)
                    .await
                    .map_err(ExtractorError::from)?;
                let actual = fetched.block.transactions.len();
                if reported != actual {
                    return Err(ExtractorError::TxCountMismatch {
                        number: block.number,
                        reported,
                        actual,
                    });
                }

                for (tx, receipt) in fetched.block.transactions.iter().zip(&fetched.receipts) {
                    self.process_mined(tx, receipt, block.number, block.timestamp)
                        .await;
                }

                self.bus.publish_block_ended(notice);

                if iterator.finished() {
                    tracing::info!(end = end_height, "end height reached");
                    break false;
                }
            };

            if !restart {
                return Ok(());
            }
        }
    }

    /// Compare the processed height against the live head and flip the
    /// one-time sync-complete flag once caught up.
    async fn check_sync(&self, number: u64) -> Result<(), ExtractorError> {
        let head = self
            .node
            .head_number()
            .await
            .map_err(ExtractorError::from)?;
        if head <= number + self.config.confirmation_depth {
            self.sync_complete.store(true, Ordering::Release);
            self.bus.publish_sync_complete(SyncNotice { head });
            tracing::info!(head, "chain sync complete");
        } else if self.config.debug {
            tracing::debug!(head, at = number, "chain sync in progress");
        }
        Ok(())
    }

    /// Decode and emit a single mined transaction: recognized events win,
    /// then recognized method calls, then the plain transfer fallback. A
    /// decode failure skips the affected item only.
    async fn process_mined(
        &self,
        tx: &RawTransaction,
        receipt: &RawReceipt,
        block_number: u64,
        block_time: i64,
    ) {
        if self.config.debug {
            tracing::debug!(
                tx = %tx.hash,
                status = receipt.status,
                logs = receipt.logs.len(),
                "processing mined transaction"
            );
        }

        if self.registry.supports_events(receipt) {
            for log in &receipt.logs {
                let meta =
                    EventMeta::mined(tx, receipt, block_number, block_time).at_log(log.log_index);
                match self.registry.decode_log(log, meta) {
                    Ok(Some(event)) => self.emit(event).await,
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(
                            tx = %tx.hash,
                            log_index = log.log_index,
                            error = %err,
                            "event decode failed, skipping log"
                        );
                    }
                }
            }
            return;
        }

        let meta = EventMeta::mined(tx, receipt, block_number, block_time);
        if self.registry.supports_method(tx) {
            match self.registry.decode_method(tx, meta) {
                Ok(Some(event)) => self.emit(event).await,
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        tx = %tx.hash,
                        error = %err,
                        "method decode failed, skipping transaction"
                    );
                }
            }
            return;
        }

        self.emit(self.registry.eth_transfer(tx, meta)).await;
    }

    /// Publish a decoded event; order fills are additionally persisted. A
    /// fill-row storage failure is logged and skipped — the event is
    /// already on the bus.
    async fn emit(&self, event: ChainEvent) {
        if let ChainEvent::OrderFilled(fill) = &event {
            let record = FillRecord::from_event(fill);
            if let Err(err) = self.store.save_fill(&record).await {
                tracing::warn!(
                    order = %fill.order_hash,
                    error = %err,
                    "fill record save failed"
                );
            }
        }
        self.bus.publish_event(event);
    }
}
