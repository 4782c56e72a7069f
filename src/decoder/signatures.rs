//! Event and function signature table
//!
//! Maps a log's topic-0 (together with its indexed topic count, so that
//! `Transfer(address,address,uint256)` and the ERC721 variant with an
//! indexed id can coexist) to candidate event schemas, and a 4-byte
//! selector to a function name for call-tree labels.

use std::collections::HashMap;

use alloy::dyn_abi::EventExt;
use alloy::json_abi::{Event, Function, JsonAbi};
use alloy::primitives::{Selector, B256};
use once_cell::sync::Lazy;

use crate::types::DynSolValue;

/// Human-readable signatures of the events governance tests assert on
const GOVERNANCE_EVENTS: &[&str] = &[
    "event LogScriptCall(address indexed sender, address indexed src, address indexed dst)",
    "event StartVote(uint256 indexed voteId, address indexed creator, string metadata)",
    "event CastVote(uint256 indexed voteId, address indexed voter, bool supports, uint256 stake)",
    "event ExecuteVote(uint256 indexed voteId)",
    "event Transfer(address indexed from, address indexed to, uint256 value)",
    "event Approval(address indexed owner, address indexed spender, uint256 value)",
    "event VaultTransfer(address indexed token, address indexed to, uint256 amount)",
    "event VaultDeposit(address indexed token, address indexed sender, uint256 amount)",
    "event RoleGranted(bytes32 indexed role, address indexed account, address indexed sender)",
    "event RoleRevoked(bytes32 indexed role, address indexed account, address indexed sender)",
    "event SetPermission(address indexed entity, address indexed app, bytes32 indexed role, bool allowed)",
    "event ChangePermissionManager(address indexed app, bytes32 indexed role, address indexed manager)",
    "event SetApp(bytes32 indexed namespace, bytes32 indexed appId, address app)",
    "event Upgraded(address indexed implementation)",
    "event ProposalSubmitted(uint256 indexed id, address indexed executor, (address,uint96,bytes)[] calls, string metadata)",
    "event ProposalScheduled(uint256 indexed id)",
    "event ProposalExecuted(uint256 indexed id)",
    "event Executed(address indexed target, uint256 ethValue, bytes data, bytes returndata)",
];

/// Function signatures used for call-tree labels
const GOVERNANCE_FUNCTIONS: &[&str] = &[
    "function newVote(bytes _executionScript, string _metadata) returns (uint256)",
    "function executeVote(uint256 _voteId)",
    "function forward(bytes _evmScript)",
    "function execScript(bytes _script, bytes _input, address[] _blacklist) returns (bytes)",
    "function transfer(address _token, address _to, uint256 _value)",
    "function grantRole(bytes32 role, address account)",
    "function revokeRole(bytes32 role, address account)",
    "function createPermission(address _entity, address _app, bytes32 _role, address _manager)",
    "function grantPermission(address _entity, address _app, bytes32 _role)",
    "function revokePermission(address _entity, address _app, bytes32 _role)",
    "function setApp(bytes32 _namespace, bytes32 _appId, address _app)",
    "function hasPermission(address _who, address _where, bytes32 _what, bytes _how) returns (bool)",
    "function getApp(bytes32 _namespace, bytes32 _appId) returns (address)",
    "function submitProposal((address,uint96,bytes)[] calls, string metadata) returns (uint256)",
    "function scheduleProposal(uint256 proposalId)",
    "function execute(address target, uint256 value, bytes payload) returns (bytes)",
];

static GOVERNANCE_DEFAULTS: Lazy<SignatureTable> = Lazy::new(|| {
    let mut table = SignatureTable::new();
    for signature in GOVERNANCE_EVENTS {
        if let Ok(event) = Event::parse(signature) {
            table.add_event(event);
        }
    }
    for signature in GOVERNANCE_FUNCTIONS {
        if let Ok(function) = Function::parse(signature) {
            table.add_function(function);
        }
    }
    table
});

/// Result of matching a log against the table
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedEvent {
    pub name: String,
    pub fields: Vec<(String, DynSolValue)>,
}

/// Lookup table of known event and function signatures
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    events: HashMap<(B256, usize), Vec<Event>>,
    functions: HashMap<Selector, Function>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Default::default()
    }

    /// Table preloaded with the governance, token and dual-governance signatures
    pub fn with_governance_defaults() -> Self {
        GOVERNANCE_DEFAULTS.clone()
    }

    /// Adds every event and function of an ABI
    pub fn from_abi(abi: &JsonAbi) -> Self {
        let mut table = Self::new();
        table.extend_abi(abi);
        table
    }

    pub fn extend_abi(&mut self, abi: &JsonAbi) {
        for event in abi.events() {
            self.add_event(event.clone());
        }
        for function in abi.functions() {
            self.add_function(function.clone());
        }
    }

    /// Registers an event schema; anonymous events cannot be matched and are ignored
    pub fn add_event(&mut self, event: Event) {
        if event.anonymous {
            log::debug!("ignoring anonymous event {}", event.name);
            return;
        }
        let key = (event.selector(), indexed_inputs(&event));
        let candidates = self.events.entry(key).or_default();
        if !candidates.contains(&event) {
            candidates.push(event);
        }
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.entry(function.selector()).or_insert(function);
    }

    /// Adds an event from a human-readable signature
    pub fn with_event(mut self, signature: &str) -> Result<Self, alloy::json_abi::parser::Error> {
        self.add_event(Event::parse(signature)?);
        Ok(self)
    }

    /// Adds a function from a human-readable signature
    pub fn with_function(mut self, signature: &str) -> Result<Self, alloy::json_abi::parser::Error> {
        self.add_function(Function::parse(signature)?);
        Ok(self)
    }

    pub fn event_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// Name of the function with this selector
    pub fn function_name(&self, selector: Selector) -> Option<&str> {
        self.functions.get(&selector).map(|function| function.name.as_str())
    }

    /// Decodes a log against every candidate schema
    ///
    /// Returns `None` if topic-0 is unknown or no candidate decodes the
    /// topics and data cleanly.
    pub fn decode_log(&self, topics: &[B256], data: &[u8]) -> Option<MatchedEvent> {
        let topic0 = *topics.first()?;
        let candidates = self.events.get(&(topic0, topics.len() - 1))?;

        for event in candidates {
            match event.decode_log_parts(topics.iter().copied(), data) {
                Ok(decoded) => {
                    let mut indexed = decoded.indexed.into_iter();
                    let mut body = decoded.body.into_iter();
                    let mut fields = Vec::with_capacity(event.inputs.len());
                    for (position, input) in event.inputs.iter().enumerate() {
                        let value = if input.indexed { indexed.next() } else { body.next() };
                        let Some(value) = value else { break };
                        let name = if input.name.is_empty() {
                            format!("arg{position}")
                        } else {
                            input.name.clone()
                        };
                        fields.push((name, value));
                    }
                    return Some(MatchedEvent {
                        name: event.name.clone(),
                        fields,
                    });
                }
                Err(e) => {
                    log::debug!("log with topic {topic0} does not decode as {}: {e}", event.name);
                }
            }
        }
        None
    }
}

fn indexed_inputs(event: &Event) -> usize {
    event.inputs.iter().filter(|param| param.indexed).count()
}
