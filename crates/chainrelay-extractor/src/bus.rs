//! The publish/subscribe bus connecting the extractor to its consumers.
//!
//! One `tokio::sync::broadcast` channel per topic: block-start, block-end,
//! fork-detected, sync-complete, decoded chain events, and inbound
//! pending-transaction arrivals. Subscriptions are explicit receiver
//! handles — dropping the handle releases the subscription, so a restart
//! cannot leak handlers. Publishing is fire-and-forget: a lagging or absent
//! consumer never blocks the extraction loop.

use alloy_primitives::B256;
use tokio::sync::broadcast;

use chainrelay_abi::events::{ChainEvent, EventKind};
use chainrelay_core::fork::ForkEvent;
use chainrelay_rpc::types::RawTransaction;

/// Identity of a block whose processing started or ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub number: u64,
    pub hash: B256,
}

/// One-time notification that the walk has caught up with the node head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncNotice {
    /// The node head at the moment sync completed.
    pub head: u64,
}

/// The explicit bus object passed to the service and to consumers.
pub struct EventBus {
    block_started: broadcast::Sender<BlockNotice>,
    block_ended: broadcast::Sender<BlockNotice>,
    forks: broadcast::Sender<ForkEvent>,
    sync_complete: broadcast::Sender<SyncNotice>,
    events: broadcast::Sender<ChainEvent>,
    pending: broadcast::Sender<RawTransaction>,
}

impl EventBus {
    /// Create a bus whose topics each buffer up to `capacity` items per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (block_started, _) = broadcast::channel(capacity);
        let (block_ended, _) = broadcast::channel(capacity);
        let (forks, _) = broadcast::channel(capacity);
        let (sync_complete, _) = broadcast::channel(capacity);
        let (events, _) = broadcast::channel(capacity);
        let (pending, _) = broadcast::channel(capacity);
        Self {
            block_started,
            block_ended,
            forks,
            sync_complete,
            events,
            pending,
        }
    }

    // ─── Subscriptions ────────────────────────────────────────────────────

    /// Subscribe to the decoded event stream.
    pub fn subscribe_events(&self) -> EventSubscription {
        EventSubscription {
            rx: self.events.subscribe(),
        }
    }

    pub fn subscribe_block_started(&self) -> broadcast::Receiver<BlockNotice> {
        self.block_started.subscribe()
    }

    pub fn subscribe_block_ended(&self) -> broadcast::Receiver<BlockNotice> {
        self.block_ended.subscribe()
    }

    pub fn subscribe_forks(&self) -> broadcast::Receiver<ForkEvent> {
        self.forks.subscribe()
    }

    pub fn subscribe_sync_complete(&self) -> broadcast::Receiver<SyncNotice> {
        self.sync_complete.subscribe()
    }

    /// Subscribe to the raw pending-transaction feed. The extractor's
    /// pending worker is the primary consumer; others may observe.
    pub fn subscribe_pending(&self) -> broadcast::Receiver<RawTransaction> {
        self.pending.subscribe()
    }

    // ─── Publication ──────────────────────────────────────────────────────

    /// Feed a mempool transaction into the bus. Called by the node-side
    /// watcher (outside this crate).
    pub fn publish_pending(&self, tx: RawTransaction) {
        let _ = self.pending.send(tx);
    }

    pub(crate) fn publish_block_started(&self, notice: BlockNotice) {
        let _ = self.block_started.send(notice);
    }

    pub(crate) fn publish_block_ended(&self, notice: BlockNotice) {
        let _ = self.block_ended.send(notice);
    }

    pub(crate) fn publish_fork(&self, fork: ForkEvent) {
        let _ = self.forks.send(fork);
    }

    pub(crate) fn publish_sync_complete(&self, notice: SyncNotice) {
        let _ = self.sync_complete.send(notice);
    }

    pub(crate) fn publish_event(&self, event: ChainEvent) {
        let _ = self.events.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Receiver handle for the decoded event stream.
pub struct EventSubscription {
    rx: broadcast::Receiver<ChainEvent>,
}

impl EventSubscription {
    /// Receive the next event of any kind.
    pub async fn recv(&mut self) -> Result<ChainEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    /// Receive the next event of a specific kind, discarding others.
    pub async fn recv_kind(
        &mut self,
        kind: EventKind,
    ) -> Result<ChainEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.kind() == kind {
                return Ok(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use chainrelay_abi::events::{ChainEvent, EthTransferEvent, EventMeta};
    use chainrelay_core::types::TxStatus;

    fn eth_transfer(value: u64) -> ChainEvent {
        ChainEvent::EthTransfer(EthTransferEvent {
            from: Address::repeat_byte(0x11),
            to: Some(Address::repeat_byte(0x22)),
            value: U256::from(value),
            meta: EventMeta {
                tx_hash: B256::repeat_byte(value as u8),
                block_number: Some(100),
                block_time: 0,
                log_index: None,
                gas_used: Some(21_000),
                status: TxStatus::Success,
                pending: false,
            },
        })
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe_events();

        bus.publish_event(eth_transfer(1));
        bus.publish_event(eth_transfer(2));

        assert_eq!(sub.recv().await.unwrap().tx_hash(), B256::repeat_byte(1));
        assert_eq!(sub.recv().await.unwrap().tx_hash(), B256::repeat_byte(2));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_block() {
        let bus = EventBus::new(16);
        bus.publish_event(eth_transfer(1));
        bus.publish_block_started(BlockNotice {
            number: 100,
            hash: B256::repeat_byte(0xa0),
        });
        // A later subscriber only sees what is published after it joined.
        let mut sub = bus.subscribe_events();
        bus.publish_event(eth_transfer(2));
        assert_eq!(sub.recv().await.unwrap().tx_hash(), B256::repeat_byte(2));
    }

    #[tokio::test]
    async fn recv_kind_filters() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe_events();

        bus.publish_event(eth_transfer(1));
        let received = sub
            .recv_kind(chainrelay_abi::events::EventKind::EthTransfer)
            .await
            .unwrap();
        assert_eq!(received.tx_hash(), B256::repeat_byte(1));
    }
}
