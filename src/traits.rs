//! Collaborator traits
//!
//! This module provides the seams through which the pipeline consumes
//! everything it does not own:
//! - `ChainSource`: trace and receipt retrieval for a transaction
//! - `LabelResolver`: registry of known deployed contracts
//!
//! Both are injected explicitly; there are no process-wide registries.

use std::collections::HashMap;
use std::future::Future;

use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::Log;

use crate::errors::FetchError;
use crate::types::RawTraceStep;

/// Receipt fields the decoder needs
#[derive(Debug, Clone, Default)]
pub struct ReceiptLogs {
    /// Whether the transaction succeeded
    pub status: bool,
    /// Recipient of the transaction, `None` for contract creation
    pub to: Option<Address>,
    /// Created contract for creation transactions
    pub contract_address: Option<Address>,
    /// Logs in emission order
    pub logs: Vec<Log>,
}

impl ReceiptLogs {
    /// Address executing at the top of the call tree
    pub fn initial_address(&self) -> Option<Address> {
        self.to.or(self.contract_address)
    }
}

/// Source of per-transaction execution data
///
/// Each method is a single request/response call; implementations own any
/// timeouts.
pub trait ChainSource {
    /// Fetches the struct-log trace of a transaction
    fn transaction_trace(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Vec<RawTraceStep>, FetchError>> + Send;

    /// Fetches the receipt of a transaction
    fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<ReceiptLogs, FetchError>> + Send;
}

/// Registry mapping deployed contracts to labels
pub trait LabelResolver {
    /// Label of a known contract, `None` if unknown
    fn resolve_label(&self, address: Address) -> Option<String>;
}

impl LabelResolver for HashMap<Address, String> {
    fn resolve_label(&self, address: Address) -> Option<String> {
        self.get(&address).cloned()
    }
}

impl<T: LabelResolver + ?Sized> LabelResolver for &T {
    fn resolve_label(&self, address: Address) -> Option<String> {
        (**self).resolve_label(address)
    }
}

/// Resolver knowing no contracts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl LabelResolver for NoLabels {
    fn resolve_label(&self, _address: Address) -> Option<String> {
        None
    }
}
