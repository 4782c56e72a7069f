//! Tracer configuration
//!
//! Provides the RPC endpoint and struct-logger switches used when fetching
//! traces. Values can be deserialized from a config file, read from the
//! environment, or set with the builder methods.

use serde::Deserialize;

/// Environment variable holding the RPC endpoint
pub const RPC_URL_ENV: &str = "GOV_TRACE_RPC_URL";

/// Connection and tracing parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    /// RPC endpoint URL, `http(s)://` or `ws(s)://`
    pub rpc_url: String,
    /// Ask the node to include memory in struct logs; LOG data is read from it
    pub enable_memory: bool,
    /// Ask the node to include return data in struct logs
    pub enable_return_data: bool,
    /// Node-side tracer timeout, e.g. `"60s"`
    pub trace_timeout: Option<String>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            enable_memory: true,
            enable_return_data: false,
            trace_timeout: None,
        }
    }
}

impl TracerConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ..Default::default()
        }
    }

    /// Default configuration with the endpoint taken from `GOV_TRACE_RPC_URL`
    pub fn from_env() -> Self {
        match std::env::var(RPC_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::new(url),
            _ => Self::default(),
        }
    }

    pub fn with_memory(mut self, yes: bool) -> Self {
        self.enable_memory = yes;
        self
    }

    pub fn with_return_data(mut self, yes: bool) -> Self {
        self.enable_return_data = yes;
        self
    }

    pub fn with_trace_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.trace_timeout = Some(timeout.into());
        self
    }
}
