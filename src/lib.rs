//! # Governance Execution Trace Decoder
//!
//! A library for turning a governance transaction into a readable,
//! structured account of what it did.
//!
//! ## Core Features
//!
//! - **Event Decoding**
//!   - Receipt logs decoded against a signature table
//!   - Events recovered from raw struct-log traces, attributed to the
//!     contract whose context emitted them
//!   - Undecodable logs kept as placeholders with raw topics and data
//!
//! - **Event Grouping**
//!   - Start-delimited groups (e.g. one group per vote item)
//!   - End-delimited groups closed by a terminal sentinel event
//!
//! - **Call Tree Analysis**
//!   - External and internal frames with per-frame gas accounting
//!   - Collapsing of uninteresting frames
//!   - Revert reason extraction
//!
//! ## Features
//!
//! - `rustls-tls`: Uses rustls as the TLS implementation instead of native-tls (OpenSSL).
//!
//!   Usage example:
//!   ```toml
//!   [dependencies]
//!   gov-trace = { version = "0.1.0", default-features = false, features = ["rustls-tls"] }
//!   ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use gov_trace::{
//!     display::{render_groups, RenderOptions},
//!     grouping::{group_by_start_marker, GroupBoundaryRule},
//!     AddressBook, EventTracer, RpcSource, SignatureTable, TracerConfig,
//! };
//! use alloy::primitives::{address, b256};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let voting = address!("2e59a20f205bb85a89c53f1936454680651e618e");
//! let source = RpcSource::connect(TracerConfig::from_env()).await?;
//! let tracer = EventTracer::new(
//!     source,
//!     SignatureTable::with_governance_defaults(),
//!     AddressBook::new().with(voting, "Voting"),
//! );
//!
//! let tx_hash = b256!("0000000000000000000000000000000000000000000000000000000000000001");
//! let events = tracer.decode_from_receipt(tx_hash).await?;
//!
//! let rules = [GroupBoundaryRule::new(voting, "LogScriptCall", "Vote item").numbered()];
//! let groups = group_by_start_marker(&events, &rules)?;
//! print!("{}", render_groups(&groups, &RenderOptions::default().colored(true)));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `types`: Core data structures (trace steps, decoded events, call frames)
//! - `trace`: Trace normalization and call tree reconstruction
//! - `decoder`: Signature table and event decoding
//! - `grouping`: Boundary rules and grouping disciplines
//! - `labels`: Contract name resolution
//! - `display`: Tree rendering
//! - `traits`: Trait definitions for the chain source and label registry
//! - `rpc`: Node-backed chain source
//! - `config`: Connection and tracing parameters
//! - `errors`: Error types and handling
//! - `utils`: Helper functions and utilities

pub mod config;
pub mod decoder;
pub mod display;
pub mod errors;
pub mod grouping;
pub mod labels;
pub mod rpc;
pub mod trace;
pub mod tracer;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use config::TracerConfig;
pub use decoder::SignatureTable;
pub use errors::{FetchError, GroupingError, MalformedTraceError, TraceError};
pub use labels::{AddressBook, ContractNameResolver};
pub use rpc::{get_provider, RpcSource};
pub use tracer::EventTracer;
pub use traits::{ChainSource, LabelResolver, ReceiptLogs};
pub use types::{CallFrame, CallKind, DecodedEvent, EventDict, RawTraceStep};
