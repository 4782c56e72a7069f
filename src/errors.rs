//! Error types for trace decoding and event grouping
//!
//! This module defines the error hierarchy of the crate:
//! - Structural trace errors (a trace that is not a standard EVM trace)
//! - Grouping errors (rule configuration does not match the event stream)
//! - Fetch errors raised by the RPC collaborator
//!
//! Undecodable logs and unknown contract addresses are deliberately *not*
//! errors: they degrade to placeholder events and raw addresses.

use alloy::primitives::{Address, TxHash};
use thiserror::Error;

/// Top-level error type for the tracing pipeline
///
/// Every fatal error that reaches a caller through [`crate::EventTracer`]
/// is wrapped in [`TraceError::Transaction`] so the failing transaction
/// hash is always part of the message.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The raw trace is not shaped like an EVM struct-log trace
    #[error("Malformed trace: {0}")]
    MalformedTrace(#[from] MalformedTraceError),

    /// Event grouping failed
    #[error("Grouping failed: {0}")]
    Grouping(#[from] GroupingError),

    /// Trace or receipt retrieval failed
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Any of the above, attributed to a transaction
    #[error("Transaction {tx_hash}: {source}")]
    Transaction {
        tx_hash: TxHash,
        #[source]
        source: Box<TraceError>,
    },
}

impl TraceError {
    /// Attributes this error to a transaction, unless it already is
    pub fn for_transaction(self, tx_hash: TxHash) -> Self {
        match self {
            TraceError::Transaction { .. } => self,
            other => TraceError::Transaction {
                tx_hash,
                source: Box::new(other),
            },
        }
    }
}

/// A trace step lacks operands or memory an opcode requires
///
/// # Fields
/// * `step` - Index of the offending step in the trace
/// * `op` - Opcode mnemonic of the step
/// * `reason` - What exactly was missing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step {step} ({op}): {reason}")]
pub struct MalformedTraceError {
    pub step: usize,
    pub op: String,
    pub reason: String,
}

impl MalformedTraceError {
    pub fn new(step: usize, op: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step,
            op: op.into(),
            reason: reason.into(),
        }
    }
}

/// Grouping failures
///
/// All of them indicate a mismatch between the configured boundary rules
/// and the actual event stream; none is recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupingError {
    /// The mandatory terminal sentinel is missing or different
    ///
    /// # Fields
    /// * `expected` - Description of the configured terminal rule
    /// * `found` - Emitter and name of the actual last event, `None` for an empty stream
    /// * `index` - Position of the actual last event
    #[error("unexpected terminal event at index {index:?}: expected {expected}, found {found:?}")]
    UnexpectedTerminalEvent {
        expected: String,
        found: Option<(Address, String)>,
        index: Option<usize>,
    },

    /// Events remained after the last end marker
    ///
    /// # Fields
    /// * `first_index` - Log index of the first unflushed event
    /// * `count` - Number of unflushed events
    #[error("{count} event(s) starting at index {first_index} were not closed by an end marker")]
    UnflushedEvents { first_index: usize, count: usize },

    /// More than one rule matched the same event
    #[error("event {index} ({name}) matches both '{first}' and '{second}'")]
    AmbiguousRule {
        index: usize,
        name: String,
        first: String,
        second: String,
    },

    /// More than one rule is marked as the service rule
    #[error("only one service rule is allowed, got '{first}' and '{second}'")]
    MultipleServiceRules { first: String, second: String },

    /// Group count differs from the number of proposal actions
    #[error("expected {expected} group(s), got {actual}")]
    GroupCount { expected: usize, actual: usize },
}

/// Errors raised while talking to the node
#[derive(Debug, Error)]
pub enum FetchError {
    /// Invalid or malformed RPC URL
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    /// WebSocket connection establishment errors
    #[error("WebSocket connection failed: {0}")]
    WsConnection(String),

    /// The node rejected or failed the request
    #[error("RPC request failed: {0}")]
    Rpc(String),

    /// The node does not know the transaction
    #[error("Receipt not found for {0}")]
    ReceiptNotFound(TxHash),

    /// The node returned something other than a struct-log trace
    #[error("Unsupported trace format: {0}")]
    UnsupportedTrace(String),

    /// A struct log could not be converted into a trace step
    #[error(transparent)]
    Malformed(#[from] MalformedTraceError),
}
