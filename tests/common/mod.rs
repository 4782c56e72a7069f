//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;

use alloy::primitives::{address, keccak256, Address, Bytes, LogData, TxHash, B256, U256};
use alloy::rpc::types::Log;
use gov_trace::{ChainSource, DecodedEvent, FetchError, RawTraceStep, ReceiptLogs};

pub const VOTING: Address = address!("2e59a20f205bb85a89c53f1936454680651e618e");
pub const AGENT: Address = address!("3e40d73eb977dc6a537af587d48316fee66e9c8c");
pub const FINANCE: Address = address!("b9e5cbb9ca5b0d659238807e84d0176930753d86");
pub const ACL: Address = address!("9895f0f17cc1d1891b6f18ee0b483b6f221b37bb");

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn event(log_index: usize, address: Address, label: &str, name: &str) -> DecodedEvent {
    DecodedEvent {
        log_index,
        address,
        label: label.to_string(),
        name: name.to_string(),
        fields: Vec::new(),
        topics: Vec::new(),
        data: Bytes::new(),
    }
}

pub fn rpc_log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address,
            data: LogData::new_unchecked(topics, data.into()),
        },
        ..Default::default()
    }
}

pub fn word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

pub fn step(depth: u64, gas: u64, gas_cost: u64, op: &str) -> RawTraceStep {
    RawTraceStep {
        depth,
        gas,
        gas_cost,
        op: op.to_string(),
        ..Default::default()
    }
}

pub fn indexed(mut steps: Vec<RawTraceStep>) -> Vec<RawTraceStep> {
    for (i, step) in steps.iter_mut().enumerate() {
        step.index = i;
    }
    steps
}

/// `LOG3 VaultTransfer(token, to, amount)` with the amount in memory word 0
///
/// The reported data length is 31 so only normalization recovers the value.
pub fn vault_transfer_log(depth: u64, token: Address, to: Address, amount: u64) -> RawTraceStep {
    let mut log = step(depth, 50_000, 1_000, "LOG3");
    // bottom to top: topic2, topic1, topic0, length, offset
    log.stack = vec![
        word(to),
        word(token),
        U256::from_be_bytes(keccak256("VaultTransfer(address,address,uint256)").0),
        U256::from(31u64),
        U256::ZERO,
    ];
    log.memory = vec![B256::from(U256::from(amount).to_be_bytes::<32>())];
    log
}

/// In-memory chain source keyed by transaction hash
#[derive(Default)]
pub struct MockSource {
    pub traces: HashMap<TxHash, Vec<RawTraceStep>>,
    pub receipts: HashMap<TxHash, ReceiptLogs>,
}

impl MockSource {
    pub fn with_trace(mut self, tx_hash: TxHash, steps: Vec<RawTraceStep>) -> Self {
        self.traces.insert(tx_hash, steps);
        self
    }

    pub fn with_receipt(mut self, tx_hash: TxHash, receipt: ReceiptLogs) -> Self {
        self.receipts.insert(tx_hash, receipt);
        self
    }
}

impl ChainSource for MockSource {
    async fn transaction_trace(&self, tx_hash: TxHash) -> Result<Vec<RawTraceStep>, FetchError> {
        self.traces
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| FetchError::Rpc(format!("no trace for {tx_hash}")))
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<ReceiptLogs, FetchError> {
        self.receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(FetchError::ReceiptNotFound(tx_hash))
    }
}
