//! Core types for trace decoding and event grouping
//!
//! This module defines the core data structures shared by every stage:
//! - Raw per-instruction trace steps
//! - Decoded (or undecoded) events and the ordered `EventDict` container
//! - Call frames of the reconstructed call tree

use std::ops::Index;

pub use alloy::dyn_abi::DynSolValue;
pub use alloy::primitives::{Address, Bytes, Selector, TxHash, B256, U256};
use alloy::rpc::types::trace::geth::StructLog;
use serde::Serialize;

use crate::errors::MalformedTraceError;

/// Name given to events whose signature could not be matched
pub const UNDECODED_EVENT_NAME: &str = "(unknown)";

/// Width of an EVM word and of an ABI slot, in bytes
pub const WORD_SIZE: usize = 32;

/// One instruction of a struct-log execution trace
///
/// `stack` is ordered bottom to top (the last element is the top of the
/// stack), `memory` is the full memory as 32-byte words.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RawTraceStep {
    /// Position in the whole trace
    pub index: usize,
    /// Program counter inside the executing code
    pub pc: u64,
    /// Opcode mnemonic, e.g. `"LOG3"`
    pub op: String,
    /// External call depth
    pub depth: u64,
    /// Internal function nesting inside the current call frame
    pub jump_depth: u64,
    /// Gas remaining before the instruction
    pub gas: u64,
    /// Gas charged for the instruction
    pub gas_cost: u64,
    pub stack: Vec<U256>,
    pub memory: Vec<B256>,
    /// Executing contract, when the trace source provides it
    pub address: Option<Address>,
}

impl RawTraceStep {
    /// Converts a geth struct log into a trace step
    ///
    /// Geth does not report jump depth, it is left at zero.
    pub fn from_struct_log(index: usize, log: &StructLog) -> Result<Self, MalformedTraceError> {
        let op = log.op.to_string();
        let memory = log
            .memory
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|word| {
                word.parse::<B256>().map_err(|e| {
                    MalformedTraceError::new(index, op.clone(), format!("bad memory word {word}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            index,
            pc: log.pc,
            depth: log.depth,
            jump_depth: 0,
            gas: log.gas,
            gas_cost: log.gas_cost,
            stack: log.stack.clone().unwrap_or_default(),
            memory,
            address: None,
            op,
        })
    }

    /// Number of topics if this is a LOG0..LOG4 step
    pub fn log_topic_count(&self) -> Option<usize> {
        match self.op.as_str() {
            "LOG0" => Some(0),
            "LOG1" => Some(1),
            "LOG2" => Some(2),
            "LOG3" => Some(3),
            "LOG4" => Some(4),
            _ => None,
        }
    }

    /// Stack item `n` positions below the top (`0` is the top)
    pub fn stack_peek(&self, n: usize) -> Option<U256> {
        self.stack.len().checked_sub(n + 1).map(|i| self.stack[i])
    }

    /// Stack item as a memory offset or length, if it fits
    pub fn stack_usize(&self, n: usize) -> Option<usize> {
        self.stack_peek(n)
            .and_then(|value| u64::try_from(value).ok())
            .and_then(|value| usize::try_from(value).ok())
    }

    /// Reads `len` bytes of memory starting at `offset`
    ///
    /// Returns `None` if the range is not covered by the recorded memory.
    pub fn memory_slice(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        if len == 0 {
            return Some(Vec::new());
        }
        let end = offset.checked_add(len)?;
        if end > self.memory.len() * WORD_SIZE {
            return None;
        }
        let first_word = offset / WORD_SIZE;
        let last_word = (end - 1) / WORD_SIZE;
        let mut bytes = Vec::with_capacity((last_word - first_word + 1) * WORD_SIZE);
        for word in &self.memory[first_word..=last_word] {
            bytes.extend_from_slice(word.as_slice());
        }
        let start = offset - first_word * WORD_SIZE;
        Some(bytes[start..start + len].to_vec())
    }
}

/// A single emitted log, decoded or not
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Position of the log in the transaction
    pub log_index: usize,
    /// Emitting contract; always set, even for undecoded logs
    pub address: Address,
    /// Human-readable contract label, empty when unknown
    pub label: String,
    /// Event name, [`UNDECODED_EVENT_NAME`] when the signature is unknown
    pub name: String,
    /// Decoded fields in ABI order
    pub fields: Vec<(String, DynSolValue)>,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl DecodedEvent {
    /// Creates a placeholder for a log no signature matched
    pub fn undecoded(log_index: usize, address: Address, topics: Vec<B256>, data: Bytes) -> Self {
        Self {
            log_index,
            address,
            label: String::new(),
            name: UNDECODED_EVENT_NAME.to_string(),
            fields: Vec::new(),
            topics,
            data,
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.name != UNDECODED_EVENT_NAME
    }

    /// Returns the value of a named field
    pub fn field(&self, name: &str) -> Option<&DynSolValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Label if known, the checksummed address otherwise
    pub fn emitter(&self) -> String {
        if self.label.is_empty() {
            self.address.to_string()
        } else {
            self.label.clone()
        }
    }
}

/// Ordered collection of decoded events
///
/// Iteration always follows transaction emission order; nothing in this
/// type re-sorts its contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDict {
    events: Vec<DecodedEvent>,
}

impl EventDict {
    pub fn new(events: Vec<DecodedEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DecodedEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[DecodedEvent] {
        &self.events
    }

    pub fn into_vec(self) -> Vec<DecodedEvent> {
        self.events
    }

    /// All events with the given name, in emission order
    pub fn get(&self, name: &str) -> Vec<&DecodedEvent> {
        self.events.iter().filter(|event| event.name == name).collect()
    }

    /// Number of events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.events.iter().filter(|event| event.name == name).count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.iter().any(|event| event.name == name)
    }

    /// First event with the given name emitted by `address`
    pub fn find(&self, address: Address, name: &str) -> Option<&DecodedEvent> {
        self.events
            .iter()
            .find(|event| event.address == address && event.name == name)
    }

    /// Event names in emission order
    pub fn names(&self) -> Vec<&str> {
        self.events.iter().map(|event| event.name.as_str()).collect()
    }

    pub fn first(&self) -> Option<&DecodedEvent> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&DecodedEvent> {
        self.events.last()
    }
}

impl Index<usize> for EventDict {
    type Output = DecodedEvent;

    fn index(&self, index: usize) -> &Self::Output {
        &self.events[index]
    }
}

impl From<Vec<DecodedEvent>> for EventDict {
    fn from(events: Vec<DecodedEvent>) -> Self {
        Self::new(events)
    }
}

impl FromIterator<DecodedEvent> for EventDict {
    fn from_iter<T: IntoIterator<Item = DecodedEvent>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for EventDict {
    type Item = DecodedEvent;
    type IntoIter = std::vec::IntoIter<DecodedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventDict {
    type Item = &'a DecodedEvent;
    type IntoIter = std::slice::Iter<'a, DecodedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// How a call frame was entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallKind {
    /// The transaction itself
    Root,
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
    /// Internal function invocation inside the same contract
    Internal,
}

impl CallKind {
    /// Kind of external frame opened by an opcode
    pub fn from_opcode(op: &str) -> Option<Self> {
        match op {
            "CALL" => Some(CallKind::Call),
            "STATICCALL" => Some(CallKind::StaticCall),
            "DELEGATECALL" => Some(CallKind::DelegateCall),
            "CALLCODE" => Some(CallKind::CallCode),
            "CREATE" => Some(CallKind::Create),
            "CREATE2" => Some(CallKind::Create2),
            _ => None,
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Create2)
    }

    /// Whether the callee runs in the caller's storage and log context
    pub fn keeps_context(&self) -> bool {
        matches!(self, CallKind::DelegateCall | CallKind::CallCode | CallKind::Internal)
    }
}

/// A node of the reconstructed call tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallFrame {
    /// `Contract.function`, an internal marker, or the raw address
    pub label: String,
    pub kind: CallKind,
    /// Code address of the frame, if known
    pub address: Option<Address>,
    /// 4-byte selector of the calldata, if any
    pub selector: Option<Selector>,
    /// First trace index belonging to the frame
    pub start: usize,
    /// Last trace index belonging to the frame
    pub end: usize,
    pub depth: u64,
    pub jump_depth: u64,
    /// Gas used by this frame's own instructions
    pub gas_used: u64,
    /// Gas used by this frame including all sub-frames
    pub gas_total: u64,
    pub children: Vec<CallFrame>,
    /// Rendered without its children
    pub collapsed: bool,
    /// Frame ended with REVERT
    pub reverted: bool,
    /// Decoded revert reason, when available
    pub revert_reason: Option<String>,
}

impl CallFrame {
    /// Total number of frames in this subtree, including itself
    pub fn frame_count(&self) -> usize {
        1 + self.children.iter().map(CallFrame::frame_count).sum::<usize>()
    }

    /// Depth-first search for the first frame with the given label
    pub fn find(&self, label: &str) -> Option<&CallFrame> {
        if self.label == label {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(label))
    }

    /// Label as rendered, with the collapse marker
    pub fn display_label(&self) -> String {
        if self.collapsed {
            format!("{} [collapsed]", self.label)
        } else {
            self.label.clone()
        }
    }
}
