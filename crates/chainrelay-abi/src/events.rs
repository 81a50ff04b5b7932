//! The closed set of recognized chain events.
//!
//! Every method call and log event the extractor knows how to decode is one
//! variant of [`ChainEvent`], tagged by a stable [`EventKind`] identifier.
//! Downstream consumers dispatch with an exhaustive `match` — an unhandled
//! kind is a compile error, not a runtime surprise.

use alloy_primitives::{Address, B256, U256};
use chainrelay_core::types::TxStatus;
use chainrelay_rpc::types::{RawReceipt, RawTransaction};
use serde::{Deserialize, Serialize};

/// Stable identifier of a recognized event, usable as an idempotency key
/// together with the transaction hash and pending flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    // Log events
    OrderFilled,
    OrderCancelled,
    Transfer,
    Approval,
    Deposit,
    Withdrawal,
    // Method calls
    SubmitOrder,
    CancelOrder,
    TransferCall,
    TransferFromCall,
    ApproveCall,
    DepositCall,
    WithdrawCall,
    // Fallback
    EthTransfer,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderFilled => "order-filled",
            Self::OrderCancelled => "order-cancelled",
            Self::Transfer => "transfer",
            Self::Approval => "approval",
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::SubmitOrder => "submit-order",
            Self::CancelOrder => "cancel-order",
            Self::TransferCall => "transfer-call",
            Self::TransferFromCall => "transfer-from-call",
            Self::ApproveCall => "approve-call",
            Self::DepositCall => "deposit-call",
            Self::WithdrawCall => "withdraw-call",
            Self::EthTransfer => "eth-transfer",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contextual metadata attached to every emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Originating transaction hash.
    pub tx_hash: B256,
    /// Block height, `None` for pending (mempool) emissions.
    pub block_number: Option<u64>,
    /// Block timestamp for mined emissions; wall-clock observation time for
    /// pending ones.
    pub block_time: i64,
    /// Log index for log events, `None` for method calls.
    pub log_index: Option<u64>,
    /// Gas used, unknown until mined.
    pub gas_used: Option<u64>,
    /// Execution status.
    pub status: TxStatus,
    /// `true` for mempool emissions. Consumers must treat pending and
    /// confirmed emissions of the same transaction as distinct
    /// notifications keyed by `(tx_hash, pending)`.
    pub pending: bool,
}

impl EventMeta {
    /// Metadata for an emission backed by a mined transaction and its
    /// receipt.
    pub fn mined(
        tx: &RawTransaction,
        receipt: &RawReceipt,
        block_number: u64,
        block_time: i64,
    ) -> Self {
        Self {
            tx_hash: tx.hash,
            block_number: Some(block_number),
            block_time,
            log_index: None,
            gas_used: Some(receipt.gas_used),
            status: if receipt.succeeded() {
                TxStatus::Success
            } else {
                TxStatus::Failed
            },
            pending: false,
        }
    }

    /// Metadata for a pending (mempool) emission: no receipt, gas and
    /// status unknown, timestamped with the observation wall clock.
    pub fn pending(tx: &RawTransaction, observed_at: i64) -> Self {
        Self {
            tx_hash: tx.hash,
            block_number: None,
            block_time: observed_at,
            log_index: None,
            gas_used: None,
            status: TxStatus::Pending,
            pending: true,
        }
    }

    /// Attach the log index of the entry this emission was decoded from.
    pub fn at_log(mut self, log_index: u64) -> Self {
        self.log_index = Some(log_index);
        self
    }
}

// ─── Log event payloads ───────────────────────────────────────────────────────

/// An order (partially) filled on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub ring_hash: B256,
    pub order_hash: B256,
    pub owner: Address,
    pub token_s: Address,
    pub token_b: Address,
    pub amount_s: U256,
    pub amount_b: U256,
    pub fee: U256,
    pub meta: EventMeta,
}

/// An order cancelled on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelEvent {
    pub order_hash: B256,
    pub amount: U256,
    pub meta: EventMeta,
}

/// ERC-20 `Transfer` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Token contract that emitted the log.
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// ERC-20 `Approval` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// Wrapped-ether `Deposit` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub token: Address,
    pub dst: Address,
    pub amount: U256,
    pub meta: EventMeta,
}

/// Wrapped-ether `Withdrawal` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalEvent {
    pub token: Address,
    pub src: Address,
    pub amount: U256,
    pub meta: EventMeta,
}

// ─── Method call payloads ─────────────────────────────────────────────────────

/// `submitOrder` call on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOrderCall {
    pub exchange: Address,
    pub order_hash: B256,
    pub amount_s: U256,
    pub amount_b: U256,
    pub meta: EventMeta,
}

/// `cancelOrder` call on the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOrderCall {
    pub exchange: Address,
    pub order_hash: B256,
    pub amount: U256,
    pub meta: EventMeta,
}

/// ERC-20 `transfer` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferCall {
    pub token: Address,
    pub to: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// ERC-20 `transferFrom` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFromCall {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// ERC-20 `approve` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveCall {
    pub token: Address,
    pub spender: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// Wrapped-ether `deposit` call; the deposited amount is the transaction
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositCall {
    pub token: Address,
    pub sender: Address,
    pub value: U256,
    pub meta: EventMeta,
}

/// Wrapped-ether `withdraw` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawCall {
    pub token: Address,
    pub amount: U256,
    pub meta: EventMeta,
}

/// Plain value transfer — the fallback for transactions matching neither a
/// registered method nor a registered event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthTransferEvent {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub meta: EventMeta,
}

// ─── ChainEvent ───────────────────────────────────────────────────────────────

/// A decoded, recognized chain event — the primary output of the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChainEvent {
    OrderFilled(FillEvent),
    OrderCancelled(CancelEvent),
    Transfer(TransferEvent),
    Approval(ApprovalEvent),
    Deposit(DepositEvent),
    Withdrawal(WithdrawalEvent),
    SubmitOrder(SubmitOrderCall),
    CancelOrder(CancelOrderCall),
    TransferCall(TransferCall),
    TransferFromCall(TransferFromCall),
    ApproveCall(ApproveCall),
    DepositCall(DepositCall),
    WithdrawCall(WithdrawCall),
    EthTransfer(EthTransferEvent),
}

impl ChainEvent {
    /// The stable identifier of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OrderFilled(_) => EventKind::OrderFilled,
            Self::OrderCancelled(_) => EventKind::OrderCancelled,
            Self::Transfer(_) => EventKind::Transfer,
            Self::Approval(_) => EventKind::Approval,
            Self::Deposit(_) => EventKind::Deposit,
            Self::Withdrawal(_) => EventKind::Withdrawal,
            Self::SubmitOrder(_) => EventKind::SubmitOrder,
            Self::CancelOrder(_) => EventKind::CancelOrder,
            Self::TransferCall(_) => EventKind::TransferCall,
            Self::TransferFromCall(_) => EventKind::TransferFromCall,
            Self::ApproveCall(_) => EventKind::ApproveCall,
            Self::DepositCall(_) => EventKind::DepositCall,
            Self::WithdrawCall(_) => EventKind::WithdrawCall,
            Self::EthTransfer(_) => EventKind::EthTransfer,
        }
    }

    /// The metadata shared by every variant.
    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::OrderFilled(e) => &e.meta,
            Self::OrderCancelled(e) => &e.meta,
            Self::Transfer(e) => &e.meta,
            Self::Approval(e) => &e.meta,
            Self::Deposit(e) => &e.meta,
            Self::Withdrawal(e) => &e.meta,
            Self::SubmitOrder(e) => &e.meta,
            Self::CancelOrder(e) => &e.meta,
            Self::TransferCall(e) => &e.meta,
            Self::TransferFromCall(e) => &e.meta,
            Self::ApproveCall(e) => &e.meta,
            Self::DepositCall(e) => &e.meta,
            Self::WithdrawCall(e) => &e.meta,
            Self::EthTransfer(e) => &e.meta,
        }
    }

    /// Originating transaction hash.
    pub fn tx_hash(&self) -> B256 {
        self.meta().tx_hash
    }
}
