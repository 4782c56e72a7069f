//! Per-transaction entry points
//!
//! [`EventTracer`] ties a [`ChainSource`] to the signature table and the
//! contract registry. Every fatal error it returns names the transaction.

use alloy::primitives::{Selector, TxHash};

use crate::decoder::{decode_receipt_logs, decode_trace, SignatureTable};
use crate::errors::TraceError;
use crate::labels::ContractNameResolver;
use crate::trace::{normalized, CallTreeBuilder, CollapsePredicate};
use crate::traits::{ChainSource, LabelResolver, ReceiptLogs};
use crate::types::{CallFrame, EventDict, RawTraceStep};

/// Decodes the events and call tree of a transaction
///
/// # Example
/// ```rust,no_run
/// use gov_trace::{AddressBook, EventTracer, RpcSource, SignatureTable, TracerConfig};
///
/// # async fn example(tx_hash: alloy::primitives::TxHash) -> anyhow::Result<()> {
/// let source = RpcSource::connect(TracerConfig::from_env()).await?;
/// let tracer = EventTracer::new(source, SignatureTable::with_governance_defaults(), AddressBook::new());
/// let events = tracer.decode_from_receipt(tx_hash).await?;
/// println!("{} event(s): {:?}", events.len(), events.names());
/// # Ok(())
/// # }
/// ```
pub struct EventTracer<S, R> {
    source: S,
    signatures: SignatureTable,
    labels: ContractNameResolver<R>,
}

impl<S: ChainSource, R: LabelResolver> EventTracer<S, R> {
    pub fn new(source: S, signatures: SignatureTable, registry: R) -> Self {
        Self {
            source,
            signatures,
            labels: ContractNameResolver::new(registry),
        }
    }

    pub fn signatures(&self) -> &SignatureTable {
        &self.signatures
    }

    pub fn labels(&self) -> &ContractNameResolver<R> {
        &self.labels
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<ReceiptLogs, TraceError> {
        self.source
            .transaction_receipt(tx_hash)
            .await
            .map_err(|e| TraceError::from(e).for_transaction(tx_hash))
    }

    /// Decodes the receipt logs of a transaction
    ///
    /// Preferred for successful transactions; a reverted transaction has an
    /// empty receipt log list.
    pub async fn decode_from_receipt(&self, tx_hash: TxHash) -> Result<EventDict, TraceError> {
        let receipt = self.receipt(tx_hash).await?;
        if !receipt.status {
            log::warn!("transaction {tx_hash} reverted, receipt carries no logs");
        }
        Ok(decode_receipt_logs(&receipt.logs, &self.signatures, &self.labels))
    }

    /// Decodes events by replaying the struct-log trace
    ///
    /// Recovers LOG instructions that a receipt does not carry, e.g. from
    /// simulated or reverted executions. The trace is normalized first.
    pub async fn decode_from_trace(&self, tx_hash: TxHash) -> Result<EventDict, TraceError> {
        let receipt = self.receipt(tx_hash).await?;
        let steps = self.fetch_steps(tx_hash).await?;
        decode_trace(&steps, receipt.initial_address(), &self.signatures, &self.labels)
            .map_err(|e| TraceError::from(e).for_transaction(tx_hash))
    }

    /// Rebuilds the call tree of a transaction
    pub async fn call_tree(
        &self,
        tx_hash: TxHash,
        collapse: CollapsePredicate,
    ) -> Result<CallFrame, TraceError> {
        self.call_tree_with_selector(tx_hash, None, collapse).await
    }

    /// Rebuilds the call tree, labelling the root with a known entry selector
    pub async fn call_tree_with_selector(
        &self,
        tx_hash: TxHash,
        root_selector: Option<Selector>,
        collapse: CollapsePredicate,
    ) -> Result<CallFrame, TraceError> {
        let receipt = self.receipt(tx_hash).await?;
        let steps = self.fetch_steps(tx_hash).await?;
        let root = CallTreeBuilder::new(&self.signatures, &self.labels)
            .collapse(collapse)
            .root(receipt.initial_address(), root_selector)
            .build(&steps);
        log::debug!("call tree of {tx_hash}: {} frame(s)", root.frame_count());
        Ok(root)
    }

    async fn fetch_steps(&self, tx_hash: TxHash) -> Result<Vec<RawTraceStep>, TraceError> {
        let steps = self
            .source
            .transaction_trace(tx_hash)
            .await
            .map_err(|e| TraceError::from(e).for_transaction(tx_hash))?;
        normalized(steps).map_err(|e| TraceError::from(e).for_transaction(tx_hash))
    }
}
