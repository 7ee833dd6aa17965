//! # Chain Gateway - Per-Chain JSON-RPC Client Registry
//!
//! ## Purpose
//!
//! Registry of per-chain RPC handles built once at startup from the `nodes[]`
//! configuration. Each handle wraps an `ethers` HTTP provider on a shared
//! pooled client. Exposes the four operations the pipeline needs (block
//! number, call simulation, raw submission, receipt lookup) behind the
//! [`ChainRpc`] trait so runs can be driven against stubs in tests.
//!
//! ## Failure Contract
//!
//! Network and protocol failures surface as `GatewayError::Transport` /
//! `GatewayError::Protocol`. A revert coming back from a simulated call is a
//! negative business outcome, not a retryable fault, and is classified into
//! `GatewayError::Revert` with the ABI-decoded reason when the node provides
//! one.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use config::NodeConfig;

/// Per-operation RPC timeout. Bounds every suspension point in a run.
const RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// Selector of `Error(string)`, the standard solidity revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
    #[error("execution reverted{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Revert { reason: Option<String> },
}

/// Read-only call request used for simulation. Gas parameters are carried so
/// the simulated execution matches what would be submitted.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub gas: u64,
    pub gas_price_wei: U256,
    pub from: Option<Address>,
}

/// The slice of a transaction receipt the pipeline cares about.
#[derive(Debug, Clone)]
pub struct ReceiptInfo {
    pub status: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Chain RPC operations used by the pipeline.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Numeric chain id for a registered chain, `None` when unknown.
    fn chain_id(&self, chain: &str) -> Option<u64>;

    async fn block_number(&self, chain: &str) -> Result<u64, GatewayError>;

    /// `eth_call` with explicit gas parameters; reverts are classified.
    async fn simulate_call(&self, chain: &str, call: &CallRequest) -> Result<Vec<u8>, GatewayError>;

    /// Submit a signed raw transaction, returning the `0x`-prefixed hash.
    async fn send_raw_transaction(
        &self,
        chain: &str,
        signed_hex: &str,
    ) -> Result<String, GatewayError>;

    /// Current nonce for `address`.
    async fn transaction_count(&self, chain: &str, address: Address)
        -> Result<u64, GatewayError>;

    /// Receipt for `tx_hash`, `None` while the transaction is unmined.
    async fn receipt(&self, chain: &str, tx_hash: &str)
        -> Result<Option<ReceiptInfo>, GatewayError>;
}

struct ChainHandle {
    chain_id: u64,
    provider: Provider<Http>,
}

/// Production [`ChainRpc`] over HTTP JSON-RPC endpoints.
pub struct ChainGateway {
    handles: HashMap<String, ChainHandle>,
}

impl ChainGateway {
    /// Build the registry from configured nodes on one pooled HTTP client.
    pub fn new(nodes: &[NodeConfig]) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(5)
            .timeout(RPC_TIMEOUT)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GatewayError::Transport(format!("HTTP client construction: {e}")))?;

        let mut handles = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let url: Url = node
                .rpc_url
                .parse()
                .map_err(|e| GatewayError::Protocol(format!("invalid RPC URL for {}: {e}", node.chain_name)))?;
            let transport = Http::new_with_client(url, client.clone());
            handles.insert(
                node.chain_name.to_lowercase(),
                ChainHandle {
                    chain_id: node.chain_id,
                    provider: Provider::new(transport),
                },
            );
            debug!(
                "🌐 Registered chain {} (id {}) at {}",
                node.chain_name, node.chain_id, node.rpc_url
            );
        }
        Ok(Self { handles })
    }

    fn handle(&self, chain: &str) -> Result<&ChainHandle, GatewayError> {
        self.handles
            .get(&chain.to_lowercase())
            .ok_or_else(|| GatewayError::UnknownChain(chain.to_string()))
    }
}

#[async_trait]
impl ChainRpc for ChainGateway {
    fn chain_id(&self, chain: &str) -> Option<u64> {
        self.handles
            .get(&chain.to_lowercase())
            .map(|handle| handle.chain_id)
    }

    async fn block_number(&self, chain: &str) -> Result<u64, GatewayError> {
        let handle = self.handle(chain)?;
        let number = handle
            .provider
            .get_block_number()
            .await
            .map_err(classify_provider_error)?;
        Ok(number.as_u64())
    }

    async fn simulate_call(&self, chain: &str, call: &CallRequest) -> Result<Vec<u8>, GatewayError> {
        let handle = self.handle(chain)?;

        let mut request = TransactionRequest::new()
            .to(call.to)
            .data(Bytes::from(call.data.clone()))
            .gas(call.gas)
            .gas_price(call.gas_price_wei);
        if let Some(from) = call.from {
            request = request.from(from);
        }
        let tx: TypedTransaction = request.into();

        let returned = handle
            .provider
            .call(&tx, None)
            .await
            .map_err(classify_provider_error)?;
        Ok(returned.to_vec())
    }

    async fn send_raw_transaction(
        &self,
        chain: &str,
        signed_hex: &str,
    ) -> Result<String, GatewayError> {
        let handle = self.handle(chain)?;
        let raw = hex::decode(signed_hex.trim_start_matches("0x"))
            .map_err(|e| GatewayError::Protocol(format!("signed transaction is not hex: {e}")))?;

        let pending = handle
            .provider
            .send_raw_transaction(Bytes::from(raw))
            .await
            .map_err(classify_provider_error)?;
        let hash: H256 = pending.tx_hash();
        Ok(format!("0x{}", hex::encode(hash.as_bytes())))
    }

    async fn transaction_count(
        &self,
        chain: &str,
        address: Address,
    ) -> Result<u64, GatewayError> {
        let handle = self.handle(chain)?;
        let nonce = handle
            .provider
            .get_transaction_count(address, None)
            .await
            .map_err(classify_provider_error)?;
        Ok(nonce.as_u64())
    }

    async fn receipt(
        &self,
        chain: &str,
        tx_hash: &str,
    ) -> Result<Option<ReceiptInfo>, GatewayError> {
        let handle = self.handle(chain)?;
        let hash: H256 = tx_hash
            .parse()
            .map_err(|e| GatewayError::Protocol(format!("invalid transaction hash: {e}")))?;

        let receipt = handle
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(classify_provider_error)?;
        Ok(receipt.map(|receipt| ReceiptInfo {
            status: receipt.status.map(|status| status.as_u64() == 1).unwrap_or(false),
            block_number: receipt.block_number.map(|number| number.as_u64()),
            gas_used: receipt.gas_used.map(|gas| gas.as_u64()),
        }))
    }
}

/// Split revert outcomes away from transport/protocol faults.
fn classify_provider_error(err: ProviderError) -> GatewayError {
    if let ProviderError::JsonRpcClientError(inner) = &err {
        if let Some(rpc_err) = inner.as_error_response() {
            let lowered = rpc_err.message.to_lowercase();
            if rpc_err.code == 3 || lowered.contains("revert") {
                let reason = rpc_err
                    .data
                    .as_ref()
                    .and_then(|data| data.as_str())
                    .and_then(decode_revert_reason)
                    .or_else(|| revert_reason_from_message(&rpc_err.message));
                return GatewayError::Revert { reason };
            }
            return GatewayError::Protocol(format!(
                "RPC error {}: {}",
                rpc_err.code, rpc_err.message
            ));
        }
    }
    GatewayError::Transport(err.to_string())
}

/// Decode an ABI `Error(string)` revert payload (`0x08c379a0...`).
pub fn decode_revert_reason(data: &str) -> Option<String> {
    let bytes = hex::decode(data.trim_start_matches("0x")).ok()?;
    if bytes.len() < 68 || bytes[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    // Word 1 is the string offset, word 2 the length, payload follows.
    let length_word = U256::from_big_endian(&bytes[36..68]);
    if length_word > U256::from(bytes.len()) {
        return None;
    }
    let length = length_word.as_usize();
    let payload = bytes.get(68..68 + length)?;
    match String::from_utf8(payload.to_vec()) {
        Ok(reason) => Some(reason),
        Err(e) => {
            warn!("Revert payload is not UTF-8: {}", e);
            None
        }
    }
}

/// Fallback extraction from `execution reverted: <reason>` style messages.
fn revert_reason_from_message(message: &str) -> Option<String> {
    let lowered = message.to_lowercase();
    let idx = lowered.find("revert")?;
    let tail = message[idx..].splitn(2, ':').nth(1)?.trim();
    (!tail.is_empty()).then(|| tail.to_string())
}
