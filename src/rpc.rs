//! Node-backed [`ChainSource`]
//!
//! Fetches struct-log traces through `debug_traceTransaction` and receipts
//! through `eth_getTransactionReceipt` using an alloy provider.

use alloy::network::ReceiptResponse;
use alloy::primitives::TxHash;
use alloy::providers::ext::DebugApi;
use alloy::providers::{DynProvider, Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::trace::geth::{
    GethDebugTracingOptions, GethDefaultTracingOptions, GethTrace,
};

use crate::config::TracerConfig;
use crate::errors::FetchError;
use crate::traits::{ChainSource, ReceiptLogs};
use crate::types::RawTraceStep;

/// Connects to an HTTP or WebSocket endpoint
pub async fn get_provider(rpc_url: &str) -> Result<DynProvider, FetchError> {
    let provider = if rpc_url.starts_with("http") {
        let url = rpc_url
            .parse()
            .map_err(|_| FetchError::InvalidRpcUrl(format!("Failed to parse RPC URL {rpc_url}")))?;
        ProviderBuilder::new().connect_http(url).erased()
    } else if rpc_url.starts_with("ws") {
        ProviderBuilder::new()
            .connect_ws(WsConnect::new(rpc_url))
            .await
            .map_err(|e| FetchError::WsConnection(e.to_string()))?
            .erased()
    } else {
        return Err(FetchError::InvalidRpcUrl(format!("Unsupported scheme in {rpc_url}")));
    };
    Ok(provider)
}

/// Trace and receipt source talking to a node
#[derive(Clone)]
pub struct RpcSource {
    provider: DynProvider,
    config: TracerConfig,
}

impl RpcSource {
    pub fn new(provider: DynProvider, config: TracerConfig) -> Self {
        Self { provider, config }
    }

    /// Connects using the endpoint of `config`
    pub async fn connect(config: TracerConfig) -> Result<Self, FetchError> {
        let provider = get_provider(&config.rpc_url).await?;
        Ok(Self::new(provider, config))
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    fn tracing_options(&self) -> GethDebugTracingOptions {
        let mut config = GethDefaultTracingOptions::default().disable_storage();
        if self.config.enable_memory {
            config = config.enable_memory();
        }
        if self.config.enable_return_data {
            config = config.enable_return_data();
        }
        GethDebugTracingOptions {
            config,
            timeout: self.config.trace_timeout.clone(),
            ..Default::default()
        }
    }
}

impl ChainSource for RpcSource {
    async fn transaction_trace(&self, tx_hash: TxHash) -> Result<Vec<RawTraceStep>, FetchError> {
        let trace = self
            .provider
            .debug_trace_transaction(tx_hash, self.tracing_options())
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?;

        let GethTrace::Default(frame) = trace else {
            return Err(FetchError::UnsupportedTrace(format!(
                "expected struct logs for {tx_hash}"
            )));
        };
        log::debug!("fetched {} struct log(s) for {tx_hash}", frame.struct_logs.len());

        frame
            .struct_logs
            .iter()
            .enumerate()
            .map(|(index, log)| RawTraceStep::from_struct_log(index, log).map_err(FetchError::from))
            .collect()
    }

    async fn transaction_receipt(&self, tx_hash: TxHash) -> Result<ReceiptLogs, FetchError> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?
            .ok_or(FetchError::ReceiptNotFound(tx_hash))?;

        Ok(ReceiptLogs {
            status: ReceiptResponse::status(&receipt),
            to: receipt.to,
            contract_address: receipt.contract_address,
            logs: receipt.inner.logs().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_unknown_scheme() {
        assert!(matches!(
            get_provider("ipc:///tmp/geth.ipc").await,
            Err(FetchError::InvalidRpcUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_tracing_options_follow_config() {
        let config = TracerConfig::new("http://127.0.0.1:8545").with_trace_timeout("30s");
        let source = RpcSource::connect(config).await.unwrap();
        let options = source.tracing_options();
        assert_eq!(options.config.enable_memory, Some(true));
        assert_eq!(options.config.disable_storage, Some(true));
        assert_eq!(options.timeout.as_deref(), Some("30s"));
    }
}
