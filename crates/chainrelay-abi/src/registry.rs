//! Contract registry — maps `(address, selector)` and `(address, topic-0)`
//! to decoders for the closed set of recognized kinds.
//!
//! Built once at startup from the configured contract addresses and the
//! embedded ABI definitions; read-only afterwards. Adding a contract is an
//! administrative restart, not a per-block mutation.

use std::collections::HashMap;

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Event, Function, JsonAbi};
use alloy_primitives::{Address, B256};

use chainrelay_rpc::types::{RawLog, RawReceipt, RawTransaction};

use crate::error::DecodeError;
use crate::events::{
    ApprovalEvent, ApproveCall, CancelEvent, CancelOrderCall, ChainEvent, DepositCall,
    DepositEvent, EthTransferEvent, EventMeta, FillEvent, SubmitOrderCall, TransferCall,
    TransferEvent, TransferFromCall, WithdrawCall, WithdrawalEvent,
};

/// Exchange contract interface: order submission, cancellation, fills.
pub const EXCHANGE_ABI: &str = r#"[
    {
        "name": "submitOrder",
        "type": "function",
        "inputs": [
            {"name": "orderHash", "type": "bytes32"},
            {"name": "amountS", "type": "uint256"},
            {"name": "amountB", "type": "uint256"}
        ],
        "outputs": [],
        "stateMutability": "nonpayable"
    },
    {
        "name": "cancelOrder",
        "type": "function",
        "inputs": [
            {"name": "orderHash", "type": "bytes32"},
            {"name": "amount", "type": "uint256"}
        ],
        "outputs": [],
        "stateMutability": "nonpayable"
    },
    {
        "name": "OrderFilled",
        "type": "event",
        "inputs": [
            {"name": "ringHash", "type": "bytes32", "indexed": true},
            {"name": "orderHash", "type": "bytes32", "indexed": true},
            {"name": "owner", "type": "address", "indexed": true},
            {"name": "tokenS", "type": "address", "indexed": false},
            {"name": "tokenB", "type": "address", "indexed": false},
            {"name": "amountS", "type": "uint256", "indexed": false},
            {"name": "amountB", "type": "uint256", "indexed": false},
            {"name": "fee", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    },
    {
        "name": "OrderCancelled",
        "type": "event",
        "inputs": [
            {"name": "orderHash", "type": "bytes32", "indexed": true},
            {"name": "amount", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    }
]"#;

/// Standard ERC-20 interface (the subset the relay recognizes).
pub const ERC20_ABI: &str = r#"[
    {
        "name": "transfer",
        "type": "function",
        "inputs": [
            {"name": "to", "type": "address"},
            {"name": "value", "type": "uint256"}
        ],
        "outputs": [{"name": "", "type": "bool"}],
        "stateMutability": "nonpayable"
    },
    {
        "name": "transferFrom",
        "type": "function",
        "inputs": [
            {"name": "from", "type": "address"},
            {"name": "to", "type": "address"},
            {"name": "value", "type": "uint256"}
        ],
        "outputs": [{"name": "", "type": "bool"}],
        "stateMutability": "nonpayable"
    },
    {
        "name": "approve",
        "type": "function",
        "inputs": [
            {"name": "spender", "type": "address"},
            {"name": "value", "type": "uint256"}
        ],
        "outputs": [{"name": "", "type": "bool"}],
        "stateMutability": "nonpayable"
    },
    {
        "name": "Transfer",
        "type": "event",
        "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    },
    {
        "name": "Approval",
        "type": "event",
        "inputs": [
            {"name": "owner", "type": "address", "indexed": true},
            {"name": "spender", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    }
]"#;

/// Wrapped-ether extras on top of ERC-20: deposit/withdraw.
pub const WETH_ABI: &str = r#"[
    {
        "name": "deposit",
        "type": "function",
        "inputs": [],
        "outputs": [],
        "stateMutability": "payable"
    },
    {
        "name": "withdraw",
        "type": "function",
        "inputs": [{"name": "wad", "type": "uint256"}],
        "outputs": [],
        "stateMutability": "nonpayable"
    },
    {
        "name": "Deposit",
        "type": "event",
        "inputs": [
            {"name": "dst", "type": "address", "indexed": true},
            {"name": "wad", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    },
    {
        "name": "Withdrawal",
        "type": "event",
        "inputs": [
            {"name": "src", "type": "address", "indexed": true},
            {"name": "wad", "type": "uint256", "indexed": false}
        ],
        "anonymous": false
    }
]"#;

/// The known contract addresses the registry is built from.
#[derive(Debug, Clone)]
pub struct ContractSet {
    /// The exchange contract.
    pub exchange: Address,
    /// Listed ERC-20 token contracts.
    pub tokens: Vec<Address>,
    /// The wrapped-ether contract (also registered as an ERC-20).
    pub weth: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodKind {
    SubmitOrder,
    CancelOrder,
    Transfer,
    TransferFrom,
    Approve,
    Deposit,
    Withdraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogKind {
    OrderFilled,
    OrderCancelled,
    Transfer,
    Approval,
    Deposit,
    Withdrawal,
}

struct MethodEntry {
    kind: MethodKind,
    function: Function,
}

struct EventEntry {
    kind: LogKind,
    event: Event,
}

/// The ABI processor: recognizes and decodes known contract calls and logs.
pub struct AbiRegistry {
    methods: HashMap<(Address, [u8; 4]), MethodEntry>,
    events: HashMap<(Address, B256), EventEntry>,
}

impl AbiRegistry {
    /// Build the registry for a set of known contracts.
    pub fn new(contracts: &ContractSet) -> Result<Self, DecodeError> {
        let exchange = parse_abi(EXCHANGE_ABI)?;
        let erc20 = parse_abi(ERC20_ABI)?;
        let weth = parse_abi(WETH_ABI)?;

        let mut registry = Self {
            methods: HashMap::new(),
            events: HashMap::new(),
        };

        registry.register(contracts.exchange, &exchange, exchange_method, exchange_log);
        for token in &contracts.tokens {
            registry.register(*token, &erc20, erc20_method, erc20_log);
        }
        registry.register(contracts.weth, &erc20, erc20_method, erc20_log);
        registry.register(contracts.weth, &weth, weth_method, weth_log);

        Ok(registry)
    }

    fn register(
        &mut self,
        address: Address,
        abi: &JsonAbi,
        method_kind: fn(&str) -> Option<MethodKind>,
        log_kind: fn(&str) -> Option<LogKind>,
    ) {
        for function in abi.functions() {
            if let Some(kind) = method_kind(&function.name) {
                self.methods.insert(
                    (address, function.selector().0),
                    MethodEntry {
                        kind,
                        function: function.clone(),
                    },
                );
            }
        }
        for event in abi.events() {
            if let Some(kind) = log_kind(&event.name) {
                self.events.insert(
                    (address, event.selector()),
                    EventEntry {
                        kind,
                        event: event.clone(),
                    },
                );
            }
        }
    }

    /// Returns `true` if the transaction targets a known contract with a
    /// registered method selector.
    pub fn supports_method(&self, tx: &RawTransaction) -> bool {
        match (tx.to, tx.selector()) {
            (Some(to), Some(selector)) => self.methods.contains_key(&(to, selector)),
            _ => false,
        }
    }

    /// Returns `true` if any log in the receipt carries a registered
    /// address + topic-0 pair.
    pub fn supports_events(&self, receipt: &RawReceipt) -> bool {
        receipt.logs.iter().any(|log| self.recognizes_log(log))
    }

    fn recognizes_log(&self, log: &RawLog) -> bool {
        log.topic0()
            .map_or(false, |topic| self.events.contains_key(&(log.address, *topic)))
    }

    /// Decode a registered method call into its typed event.
    ///
    /// Returns `Ok(None)` when the transaction does not match any
    /// registered method — the caller falls through to the transfer path.
    pub fn decode_method(
        &self,
        tx: &RawTransaction,
        meta: EventMeta,
    ) -> Result<Option<ChainEvent>, DecodeError> {
        let (to, selector) = match (tx.to, tx.selector()) {
            (Some(to), Some(selector)) => (to, selector),
            _ => return Ok(None),
        };
        let Some(entry) = self.methods.get(&(to, selector)) else {
            return Ok(None);
        };

        let name = entry.function.name.as_str();
        let values = decode_input_tuple(&entry.function, &tx.input[4..])?;

        let event = match entry.kind {
            MethodKind::SubmitOrder => ChainEvent::SubmitOrder(SubmitOrderCall {
                exchange: to,
                order_hash: arg_b256(&values, 0, name)?,
                amount_s: arg_u256(&values, 1, name)?,
                amount_b: arg_u256(&values, 2, name)?,
                meta,
            }),
            MethodKind::CancelOrder => ChainEvent::CancelOrder(CancelOrderCall {
                exchange: to,
                order_hash: arg_b256(&values, 0, name)?,
                amount: arg_u256(&values, 1, name)?,
                meta,
            }),
            MethodKind::Transfer => ChainEvent::TransferCall(TransferCall {
                token: to,
                to: arg_address(&values, 0, name)?,
                value: arg_u256(&values, 1, name)?,
                meta,
            }),
            MethodKind::TransferFrom => ChainEvent::TransferFromCall(TransferFromCall {
                token: to,
                from: arg_address(&values, 0, name)?,
                to: arg_address(&values, 1, name)?,
                value: arg_u256(&values, 2, name)?,
                meta,
            }),
            MethodKind::Approve => ChainEvent::ApproveCall(ApproveCall {
                token: to,
                spender: arg_address(&values, 0, name)?,
                value: arg_u256(&values, 1, name)?,
                meta,
            }),
            MethodKind::Deposit => ChainEvent::DepositCall(DepositCall {
                token: to,
                sender: tx.from,
                value: tx.value,
                meta,
            }),
            MethodKind::Withdraw => ChainEvent::WithdrawCall(WithdrawCall {
                token: to,
                amount: arg_u256(&values, 0, name)?,
                meta,
            }),
        };
        Ok(Some(event))
    }

    /// Decode a single log entry into its typed event.
    ///
    /// Returns `Ok(None)` for logs with no registered address + topic-0
    /// pair; those are ignored without error.
    pub fn decode_log(
        &self,
        log: &RawLog,
        meta: EventMeta,
    ) -> Result<Option<ChainEvent>, DecodeError> {
        let Some(topic0) = log.topic0() else {
            return Ok(None);
        };
        let Some(entry) = self.events.get(&(log.address, *topic0)) else {
            return Ok(None);
        };

        let name = entry.event.name.as_str();
        let (indexed, body) = decode_log_values(&entry.event, log)?;
        let (indexed, body) = (&indexed[..], &body[..]);

        let event = match entry.kind {
            LogKind::OrderFilled => ChainEvent::OrderFilled(FillEvent {
                ring_hash: arg_b256(indexed, 0, name)?,
                order_hash: arg_b256(indexed, 1, name)?,
                owner: arg_address(indexed, 2, name)?,
                token_s: arg_address(body, 0, name)?,
                token_b: arg_address(body, 1, name)?,
                amount_s: arg_u256(body, 2, name)?,
                amount_b: arg_u256(body, 3, name)?,
                fee: arg_u256(body, 4, name)?,
                meta,
            }),
            LogKind::OrderCancelled => ChainEvent::OrderCancelled(CancelEvent {
                order_hash: arg_b256(indexed, 0, name)?,
                amount: arg_u256(body, 0, name)?,
                meta,
            }),
            LogKind::Transfer => ChainEvent::Transfer(TransferEvent {
                token: log.address,
                from: arg_address(indexed, 0, name)?,
                to: arg_address(indexed, 1, name)?,
                value: arg_u256(body, 0, name)?,
                meta,
            }),
            LogKind::Approval => ChainEvent::Approval(ApprovalEvent {
                token: log.address,
                owner: arg_address(indexed, 0, name)?,
                spender: arg_address(indexed, 1, name)?,
                value: arg_u256(body, 0, name)?,
                meta,
            }),
            LogKind::Deposit => ChainEvent::Deposit(DepositEvent {
                token: log.address,
                dst: arg_address(indexed, 0, name)?,
                amount: arg_u256(body, 0, name)?,
                meta,
            }),
            LogKind::Withdrawal => ChainEvent::Withdrawal(WithdrawalEvent {
                token: log.address,
                src: arg_address(indexed, 0, name)?,
                amount: arg_u256(body, 0, name)?,
                meta,
            }),
        };
        Ok(Some(event))
    }

    /// Fallback path for plain value transfers that match neither a method
    /// nor an event.
    pub fn eth_transfer(&self, tx: &RawTransaction, meta: EventMeta) -> ChainEvent {
        ChainEvent::EthTransfer(EthTransferEvent {
            from: tx.from,
            to: tx.to,
            value: tx.value,
            meta,
        })
    }
}

fn parse_abi(json: &str) -> Result<JsonAbi, DecodeError> {
    serde_json::from_str(json).map_err(|e| DecodeError::InvalidAbi(e.to_string()))
}

/// ABI-decode a function's input payload (the bytes after the selector) as
/// the tuple of its declared parameter types.
fn decode_input_tuple(function: &Function, data: &[u8]) -> Result<Vec<DynSolValue>, DecodeError> {
    if function.inputs.is_empty() {
        return Ok(vec![]);
    }
    let types = function
        .inputs
        .iter()
        .map(|p| p.resolve())
        .collect::<Result<Vec<DynSolType>, _>>()
        .map_err(|e| DecodeError::AbiDecode {
            kind: function.name.clone(),
            reason: e.to_string(),
        })?;
    let decoded = DynSolType::Tuple(types)
        .abi_decode(data)
        .map_err(|e| DecodeError::AbiDecode {
            kind: function.name.clone(),
            reason: e.to_string(),
        })?;
    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

/// Decode a log's indexed parameters from `topics[1..]` (one 32-byte word
/// each — all registered signatures use value types there) and its
/// non-indexed parameters from the data payload.
fn decode_log_values(
    event: &Event,
    log: &RawLog,
) -> Result<(Vec<DynSolValue>, Vec<DynSolValue>), DecodeError> {
    let fail = |reason: String| DecodeError::AbiDecode {
        kind: event.name.clone(),
        reason,
    };

    let mut indexed = Vec::new();
    for (position, param) in event.inputs.iter().filter(|p| p.indexed).enumerate() {
        let topic = log
            .topics
            .get(position + 1)
            .ok_or_else(|| fail(format!("missing topic {}", position + 1)))?;
        let ty = param.resolve().map_err(|e| fail(e.to_string()))?;
        let value = ty
            .abi_decode(topic.as_slice())
            .map_err(|e| fail(format!("topic decode: {e}")))?;
        indexed.push(value);
    }

    let types = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.resolve())
        .collect::<Result<Vec<DynSolType>, _>>()
        .map_err(|e| fail(e.to_string()))?;
    let body = if types.is_empty() {
        vec![]
    } else {
        match DynSolType::Tuple(types)
            .abi_decode(&log.data)
            .map_err(|e| fail(e.to_string()))?
        {
            DynSolValue::Tuple(values) => values,
            other => vec![other],
        }
    };

    Ok((indexed, body))
}

fn exchange_method(name: &str) -> Option<MethodKind> {
    match name {
        "submitOrder" => Some(MethodKind::SubmitOrder),
        "cancelOrder" => Some(MethodKind::CancelOrder),
        _ => None,
    }
}

fn exchange_log(name: &str) -> Option<LogKind> {
    match name {
        "OrderFilled" => Some(LogKind::OrderFilled),
        "OrderCancelled" => Some(LogKind::OrderCancelled),
        _ => None,
    }
}

fn erc20_method(name: &str) -> Option<MethodKind> {
    match name {
        "transfer" => Some(MethodKind::Transfer),
        "transferFrom" => Some(MethodKind::TransferFrom),
        "approve" => Some(MethodKind::Approve),
        _ => None,
    }
}

fn erc20_log(name: &str) -> Option<LogKind> {
    match name {
        "Transfer" => Some(LogKind::Transfer),
        "Approval" => Some(LogKind::Approval),
        _ => None,
    }
}

fn weth_method(name: &str) -> Option<MethodKind> {
    match name {
        "deposit" => Some(MethodKind::Deposit),
        "withdraw" => Some(MethodKind::Withdraw),
        _ => None,
    }
}

fn weth_log(name: &str) -> Option<LogKind> {
    match name {
        "Deposit" => Some(LogKind::Deposit),
        "Withdrawal" => Some(LogKind::Withdrawal),
        _ => None,
    }
}

fn arg_address(values: &[DynSolValue], index: usize, kind: &str) -> Result<Address, DecodeError> {
    values
        .get(index)
        .and_then(DynSolValue::as_address)
        .ok_or_else(|| DecodeError::ArgMismatch {
            kind: kind.into(),
            index,
            expected: "address",
        })
}

fn arg_u256(
    values: &[DynSolValue],
    index: usize,
    kind: &str,
) -> Result<alloy_primitives::U256, DecodeError> {
    values
        .get(index)
        .and_then(|v| v.as_uint())
        .map(|(value, _)| value)
        .ok_or_else(|| DecodeError::ArgMismatch {
            kind: kind.into(),
            index,
            expected: "uint256",
        })
}

fn arg_b256(values: &[DynSolValue], index: usize, kind: &str) -> Result<B256, DecodeError> {
    values
        .get(index)
        .and_then(|v| v.as_fixed_bytes())
        .and_then(|(bytes, size)| (size == 32).then(|| B256::from_slice(bytes)))
        .ok_or_else(|| DecodeError::ArgMismatch {
            kind: kind.into(),
            index,
            expected: "bytes32",
        })
}
