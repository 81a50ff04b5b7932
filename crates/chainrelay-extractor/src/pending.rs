//! Pending-transaction worker.
//!
//! Consumes the bus's mempool feed on a single task, so notifications are
//! handled one at a time in delivery order — overlapping handlers for the
//! same transaction cannot occur. Matched methods are decoded and emitted
//! immediately with a wall-clock timestamp, no receipt, and `Pending`
//! status; everything else falls through to the plain transfer path. These
//! emissions are not deduplicated against the later confirmed emission:
//! consumers key on `(tx_hash, pending)`.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use chainrelay_abi::events::EventMeta;
use chainrelay_abi::registry::AbiRegistry;
use chainrelay_rpc::types::RawTransaction;

use crate::bus::EventBus;

pub(crate) struct PendingWorker {
    pub(crate) registry: Arc<AbiRegistry>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) feed: broadcast::Receiver<RawTransaction>,
    pub(crate) shutdown: watch::Receiver<bool>,
    pub(crate) debug: bool,
}

impl PendingWorker {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                item = self.feed.recv() => match item {
                    Ok(tx) => self.process(tx).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "pending feed lagged, transactions dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("pending worker stopped");
    }

    async fn process(&self, tx: RawTransaction) {
        if self.debug {
            tracing::debug!(tx = %tx.hash, "processing pending transaction");
        }

        let meta = EventMeta::pending(&tx, chrono::Utc::now().timestamp());

        if self.registry.supports_method(&tx) {
            match self.registry.decode_method(&tx, meta) {
                Ok(Some(event)) => self.bus.publish_event(event),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        tx = %tx.hash,
                        error = %err,
                        "pending method decode failed, skipping"
                    );
                }
            }
        } else {
            self.bus.publish_event(self.registry.eth_transfer(&tx, meta));
        }
    }
}
