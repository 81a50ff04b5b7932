//! End-to-end extraction scenarios against a scripted node.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use tokio::time::timeout;

use chainrelay_abi::events::{ChainEvent, EventKind};
use chainrelay_abi::registry::{AbiRegistry, ContractSet};
use chainrelay_core::config::ExtractorConfigBuilder;
use chainrelay_core::types::TxStatus;
use chainrelay_core::ExtractorError;
use chainrelay_extractor::{EventBus, ExtractorService};
use chainrelay_rpc::client::NodeClient;
use chainrelay_rpc::error::RpcError;
use chainrelay_rpc::types::{BlockWithReceipts, RawBlock, RawLog, RawReceipt, RawTransaction};
use chainrelay_storage::{MemoryStore, RelayStore};

const WAIT: Duration = Duration::from_secs(5);

fn exchange() -> Address {
    Address::repeat_byte(0xe1)
}

fn token() -> Address {
    Address::repeat_byte(0x20)
}

fn weth() -> Address {
    Address::repeat_byte(0x57)
}

fn registry() -> Arc<AbiRegistry> {
    Arc::new(
        AbiRegistry::new(&ContractSet {
            exchange: exchange(),
            tokens: vec![token()],
            weth: weth(),
        })
        .unwrap(),
    )
}

/// Branch-tagged block hash: distinct per (branch, height).
fn h(branch: u8, number: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = branch;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::new(bytes)
}

fn word_of_address(addr: Address) -> Vec<u8> {
    let mut word = vec![0u8; 12];
    word.extend_from_slice(addr.as_slice());
    word
}

fn word_of_u64(value: u64) -> Vec<u8> {
    let mut word = vec![0u8; 24];
    word.extend_from_slice(&value.to_be_bytes());
    word
}

fn plain_tx(tag: u8, value: u64) -> (RawTransaction, RawReceipt) {
    let tx = RawTransaction {
        hash: B256::repeat_byte(tag),
        from: Address::repeat_byte(0x11),
        to: Some(Address::repeat_byte(0x99)),
        input: Bytes::new(),
        value: U256::from(value),
        gas: 21_000,
    };
    let receipt = RawReceipt {
        transaction_hash: tx.hash,
        gas_used: 21_000,
        status: 1,
        logs: vec![],
    };
    (tx, receipt)
}

/// An ERC-20 `transfer` method call with no logs in its receipt.
fn transfer_call_tx(tag: u8, to: Address, value: u64) -> (RawTransaction, RawReceipt) {
    let mut calldata = vec![0xa9, 0x05, 0x9c, 0xbb];
    calldata.extend(word_of_address(to));
    calldata.extend(word_of_u64(value));
    let tx = RawTransaction {
        hash: B256::repeat_byte(tag),
        from: Address::repeat_byte(0x11),
        to: Some(token()),
        input: Bytes::from(calldata),
        value: U256::ZERO,
        gas: 60_000,
    };
    let receipt = RawReceipt {
        transaction_hash: tx.hash,
        gas_used: 40_000,
        status: 1,
        logs: vec![],
    };
    (tx, receipt)
}

/// A transaction whose receipt carries an ERC-20 `Transfer` log.
fn transfer_log_tx(tag: u8, from: Address, to: Address, value: u64) -> (RawTransaction, RawReceipt) {
    let tx = RawTransaction {
        hash: B256::repeat_byte(tag),
        from,
        to: Some(token()),
        input: Bytes::new(),
        value: U256::ZERO,
        gas: 60_000,
    };
    let log = RawLog {
        address: token(),
        topics: vec![
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
                .parse()
                .unwrap(),
            B256::left_padding_from(from.as_slice()),
            B256::left_padding_from(to.as_slice()),
        ],
        data: Bytes::from(word_of_u64(value)),
        log_index: 0,
    };
    let receipt = RawReceipt {
        transaction_hash: tx.hash,
        gas_used: 51_000,
        status: 1,
        logs: vec![log],
    };
    (tx, receipt)
}

fn block(
    branch: u8,
    number: u64,
    parent_hash: B256,
    txs: Vec<(RawTransaction, RawReceipt)>,
) -> BlockWithReceipts {
    let (transactions, receipts) = txs.into_iter().unzip();
    BlockWithReceipts {
        block: RawBlock {
            number,
            hash: h(branch, number),
            parent_hash,
            timestamp: number * 12,
            transactions,
        },
        receipts,
    }
}

/// Build a linear branch `first..=last`, with `txs_at` supplying the
/// transactions for each height.
fn branch(
    tag: u8,
    first: u64,
    last: u64,
    parent_of_first: B256,
    mut txs_at: impl FnMut(u64) -> Vec<(RawTransaction, RawReceipt)>,
) -> HashMap<u64, BlockWithReceipts> {
    let mut blocks = HashMap::new();
    let mut parent = parent_of_first;
    for number in first..=last {
        let b = block(tag, number, parent, txs_at(number));
        parent = b.block.hash;
        blocks.insert(number, b);
    }
    blocks
}

/// A branch replacement applied when a given height is first fetched.
struct BranchSwitch {
    trigger_height: u64,
    blocks: HashMap<u64, BlockWithReceipts>,
    head: u64,
}

/// Scripted in-memory node.
struct MockNode {
    head: AtomicU64,
    blocks: Mutex<HashMap<u64, BlockWithReceipts>>,
    switch: Mutex<Option<BranchSwitch>>,
    /// Report a wrong transaction count for every block.
    corrupt_tx_counts: AtomicBool,
}

impl MockNode {
    fn new(head: u64, blocks: HashMap<u64, BlockWithReceipts>) -> Self {
        Self {
            head: AtomicU64::new(head),
            blocks: Mutex::new(blocks),
            switch: Mutex::new(None),
            corrupt_tx_counts: AtomicBool::new(false),
        }
    }

    fn schedule_switch(&self, switch: BranchSwitch) {
        *self.switch.lock().unwrap() = Some(switch);
    }

    fn apply_switch_if_triggered(&self, number: u64) {
        let mut guard = self.switch.lock().unwrap();
        if guard.as_ref().map_or(false, |s| s.trigger_height == number) {
            let switch = guard.take().unwrap();
            let mut blocks = self.blocks.lock().unwrap();
            blocks.extend(switch.blocks);
            self.head.store(switch.head, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn head_number(&self) -> Result<u64, RpcError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn block_with_receipts(
        &self,
        number: u64,
    ) -> Result<Option<BlockWithReceipts>, RpcError> {
        self.apply_switch_if_triggered(number);
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn block_hash(&self, number: u64) -> Result<Option<B256>, RpcError> {
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .map(|b| b.block.hash))
    }

    async fn transaction_count_by_hash(&self, hash: B256) -> Result<usize, RpcError> {
        let count = self
            .blocks
            .lock()
            .unwrap()
            .values()
            .find(|b| b.block.hash == hash)
            .map(|b| b.block.transactions.len())
            .unwrap_or(0);
        if self.corrupt_tx_counts.load(Ordering::SeqCst) {
            Ok(count + 3)
        } else {
            Ok(count)
        }
    }
}

fn service(
    node: Arc<MockNode>,
    store: Arc<MemoryStore>,
    bus: Arc<EventBus>,
    start_block: u64,
    confirmation_depth: u64,
) -> ExtractorService {
    let config = ExtractorConfigBuilder::new()
        .start_block(start_block)
        .confirmation_depth(confirmation_depth)
        .max_fork_depth(32)
        .poll_interval_ms(10)
        .build();
    ExtractorService::new(config, node, store, registry(), bus)
}

#[tokio::test]
async fn processes_blocks_in_order_and_emits_typed_events() {
    let blocks = branch(0xa, 100, 103, h(0xa, 99), |number| match number {
        100 => vec![transfer_call_tx(0x01, Address::repeat_byte(0x22), 1_000_000)],
        101 => vec![transfer_log_tx(
            0x02,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            77,
        )],
        102 => vec![plain_tx(0x03, 42)],
        _ => vec![],
    });
    let node = Arc::new(MockNode::new(105, blocks));
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));

    let mut events = bus.subscribe_events();
    let mut started = bus.subscribe_block_started();
    let mut ended = bus.subscribe_block_ended();
    let mut sync = bus.subscribe_sync_complete();

    let mut svc = service(Arc::clone(&node), Arc::clone(&store), Arc::clone(&bus), 100, 2);
    svc.start().await.unwrap();

    // Block lifecycle notifications arrive strictly in height order.
    for number in 100..=103 {
        let notice = timeout(WAIT, started.recv()).await.unwrap().unwrap();
        assert_eq!(notice.number, number);
        let notice = timeout(WAIT, ended.recv()).await.unwrap().unwrap();
        assert_eq!(notice.number, number);
    }

    // Decoded events in on-chain order, one per transaction.
    let first = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    match first {
        ChainEvent::TransferCall(call) => {
            assert_eq!(call.value, U256::from(1_000_000u64));
            assert_eq!(call.meta.block_number, Some(100));
            assert_eq!(call.meta.status, TxStatus::Success);
            assert!(!call.meta.pending);
        }
        other => panic!("expected TransferCall, got {:?}", other.kind()),
    }
    let second = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    match second {
        ChainEvent::Transfer(transfer) => {
            assert_eq!(transfer.value, U256::from(77u64));
            assert_eq!(transfer.meta.block_number, Some(101));
            assert_eq!(transfer.meta.log_index, Some(0));
        }
        other => panic!("expected Transfer, got {:?}", other.kind()),
    }
    let third = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(third.kind(), EventKind::EthTransfer);

    // Catching up to head 105 with depth 2 completes at block 103.
    let notice = timeout(WAIT, sync.recv()).await.unwrap().unwrap();
    assert_eq!(notice.head, 105);
    assert!(svc.sync_complete());

    // All four blocks persisted exactly once.
    assert_eq!(store.block_count(), 4);
    assert_eq!(store.latest_block().await.unwrap().unwrap().number, 103);

    svc.stop().await;
    assert!(!svc.running());
}

#[tokio::test]
async fn fork_is_detected_rewound_and_reprocessed() {
    // Branch A up to height 100; fetching 101 reveals branch B, which
    // replaced everything above 98.
    let branch_a = branch(0xa, 98, 100, h(0xa, 97), |_| vec![]);
    let branch_b = branch(0xb, 99, 103, h(0xa, 98), |_| vec![]);

    let node = Arc::new(MockNode::new(105, branch_a));
    node.schedule_switch(BranchSwitch {
        trigger_height: 101,
        blocks: branch_b,
        head: 105,
    });

    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));
    let mut started = bus.subscribe_block_started();
    let mut forks = bus.subscribe_forks();

    let mut svc = service(Arc::clone(&node), Arc::clone(&store), Arc::clone(&bus), 98, 2);
    svc.start().await.unwrap();

    let fork = timeout(WAIT, forks.recv()).await.unwrap().unwrap();
    assert_eq!(fork.fork_block, 98);
    assert_eq!(fork.detected_block, 101);

    // Heights processed: 98..100 on branch A, then 99 onwards again on
    // branch B after the rewind to fork_block + 1. Height 98 is never
    // reprocessed.
    let mut sequence = Vec::new();
    for _ in 0..8 {
        let notice = timeout(WAIT, started.recv()).await.unwrap().unwrap();
        sequence.push(notice.number);
    }
    assert_eq!(sequence, vec![98, 99, 100, 99, 100, 101, 102, 103]);

    // The rewound heights were re-persisted from the new branch,
    // overwriting the invalidated records.
    assert_eq!(store.block_at(98).unwrap().hash, h(0xa, 98));
    assert_eq!(store.block_at(99).unwrap().hash, h(0xb, 99));
    assert_eq!(store.block_at(100).unwrap().hash, h(0xb, 100));
    assert_eq!(store.latest_block().await.unwrap().unwrap().number, 103);

    svc.stop().await;
}

#[tokio::test]
async fn transaction_count_mismatch_is_fatal() {
    let blocks = branch(0xa, 100, 100, h(0xa, 99), |_| vec![plain_tx(0x01, 1)]);
    let node = Arc::new(MockNode::new(110, blocks));
    node.corrupt_tx_counts.store(true, Ordering::SeqCst);

    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));
    let mut ended = bus.subscribe_block_ended();

    let mut svc = service(Arc::clone(&node), store, Arc::clone(&bus), 100, 2);
    svc.start().await.unwrap();

    let result = timeout(WAIT, svc.wait()).await.unwrap();
    match result {
        Err(ExtractorError::TxCountMismatch {
            number,
            reported,
            actual,
        }) => {
            assert_eq!(number, 100);
            assert_eq!(reported, 4);
            assert_eq!(actual, 1);
        }
        other => panic!("expected TxCountMismatch, got {other:?}"),
    }

    // The block never completed.
    assert!(ended.try_recv().is_err());
    svc.stop().await;
}

#[tokio::test]
async fn pending_transactions_are_decoded_with_unknown_execution_context() {
    // Head stays at 0: the block worker sits waiting for confirmations
    // while the pending path runs independently.
    let node = Arc::new(MockNode::new(0, HashMap::new()));
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));
    let mut events = bus.subscribe_events();

    let mut svc = service(Arc::clone(&node), store, Arc::clone(&bus), 100, 12);
    svc.start().await.unwrap();

    let before = chrono::Utc::now().timestamp();
    let (known, _) = transfer_call_tx(0x31, Address::repeat_byte(0x22), 555);
    let (unknown, _) = plain_tx(0x32, 9);
    bus.publish_pending(known);
    bus.publish_pending(unknown);

    let first = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    match first {
        ChainEvent::TransferCall(call) => {
            assert_eq!(call.value, U256::from(555u64));
            assert!(call.meta.pending);
            assert_eq!(call.meta.status, TxStatus::Pending);
            assert_eq!(call.meta.block_number, None);
            assert_eq!(call.meta.gas_used, None);
            // Timestamped with the observation wall clock, not a block time.
            let after = chrono::Utc::now().timestamp();
            assert!(call.meta.block_time >= before && call.meta.block_time <= after);
        }
        other => panic!("expected TransferCall, got {:?}", other.kind()),
    }

    // Handled one at a time, in delivery order.
    let second = timeout(WAIT, events.recv()).await.unwrap().unwrap();
    assert_eq!(second.kind(), EventKind::EthTransfer);
    assert!(second.meta().pending);

    svc.stop().await;
}

#[tokio::test]
async fn restart_resumes_from_latest_persisted_block() {
    let blocks = branch(0xa, 100, 101, h(0xa, 99), |_| vec![]);
    let node = Arc::new(MockNode::new(110, blocks));
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(EventBus::new(64));

    // A previous run already persisted height 100.
    store
        .save_block(&chainrelay_core::types::Block {
            number: 100,
            hash: h(0xa, 100),
            parent_hash: h(0xa, 99),
            timestamp: 1200,
        })
        .await
        .unwrap();

    let mut started = bus.subscribe_block_started();

    // Configured to start at 0, but the persisted block wins.
    let mut svc = service(Arc::clone(&node), Arc::clone(&store), Arc::clone(&bus), 0, 2);
    svc.start().await.unwrap();

    let first = timeout(WAIT, started.recv()).await.unwrap().unwrap();
    assert_eq!(first.number, 100);
    let second = timeout(WAIT, started.recv()).await.unwrap().unwrap();
    assert_eq!(second.number, 101);

    svc.stop().await;
}
