//! EVM bundle relay client (`eth_sendBundle` / `flashbots_getBundleStats`).
//!
//! One client serves every configured EVM chain; the per-chain builder URL
//! map comes from the `suave` configuration section. Bundles either land as a
//! unit in the targeted block or not at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::RelayError;

const RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// `eth_sendBundle` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmBundle {
    pub txs: Vec<String>,
    /// Hex-encoded target block number.
    pub block_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_timestamp: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reverting_tx_hashes: Vec<String>,
}

impl EvmBundle {
    pub fn for_block(txs: Vec<String>, target_block: u64) -> Self {
        Self {
            txs,
            block_number: format!("{target_block:#x}"),
            min_timestamp: None,
            max_timestamp: None,
            reverting_tx_hashes: Vec::new(),
        }
    }
}

/// Relay-reported bundle status. Terminal when a block number is present
/// (landed) or the status string says failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmBundleStats {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

impl EvmBundleStats {
    pub fn landed(&self) -> bool {
        self.block_number.is_some()
            || self
                .status
                .as_deref()
                .is_some_and(|status| status.eq_ignore_ascii_case("landed"))
    }

    pub fn failed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case("failed"))
    }
}

/// EVM bundle relay seam.
#[async_trait]
pub trait EvmBundleRelay: Send + Sync {
    /// Whether a builder endpoint is configured for `chain`.
    fn supports_chain(&self, chain: &str) -> bool;

    /// Submit a bundle; returns the relay's bundle hash when it reports one.
    async fn send_bundle(&self, chain: &str, bundle: &EvmBundle)
        -> Result<Option<String>, RelayError>;

    async fn bundle_stats(
        &self,
        chain: &str,
        bundle_id: &str,
        block_number: &str,
    ) -> Result<EvmBundleStats, RelayError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Production client for SUAVE-style per-chain builders.
pub struct FlashbotsClient {
    client: reqwest::Client,
    builder_urls: HashMap<String, String>,
    auth_token: Option<String>,
}

impl FlashbotsClient {
    pub fn new(
        builder_urls: HashMap<String, String>,
        auth_token: Option<String>,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RelayError::Transport(format!("HTTP client construction: {e}")))?;
        Ok(Self {
            client,
            builder_urls: builder_urls
                .into_iter()
                .map(|(chain, url)| (chain.to_lowercase(), url))
                .collect(),
            auth_token,
        })
    }

    fn url_for(&self, chain: &str) -> Result<&str, RelayError> {
        self.builder_urls
            .get(&chain.to_lowercase())
            .map(String::as_str)
            .ok_or_else(|| RelayError::NoEndpoint(chain.to_string()))
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RelayError> {
        let mut request = self.client.post(url).json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| RelayError::Malformed(e.to_string()))?;
        if let Some(err) = envelope.error {
            return Err(RelayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(envelope.result)
    }
}

#[async_trait]
impl EvmBundleRelay for FlashbotsClient {
    fn supports_chain(&self, chain: &str) -> bool {
        self.builder_urls.contains_key(&chain.to_lowercase())
    }

    async fn send_bundle(
        &self,
        chain: &str,
        bundle: &EvmBundle,
    ) -> Result<Option<String>, RelayError> {
        let url = self.url_for(chain)?;
        debug!(
            "📦 Submitting {}-tx bundle for block {} to {}",
            bundle.txs.len(),
            bundle.block_number,
            url
        );

        // Relays answer either `{"bundleHash": "0x.."}` or a bare hash string.
        let result: Option<serde_json::Value> =
            self.rpc(url, "eth_sendBundle", json!([bundle])).await?;
        Ok(result.and_then(|value| {
            value
                .get("bundleHash")
                .and_then(|hash| hash.as_str())
                .map(str::to_string)
                .or_else(|| value.as_str().map(str::to_string))
        }))
    }

    async fn bundle_stats(
        &self,
        chain: &str,
        bundle_id: &str,
        block_number: &str,
    ) -> Result<EvmBundleStats, RelayError> {
        let url = self.url_for(chain)?;
        let result: Option<EvmBundleStats> = self
            .rpc(
                url,
                "flashbots_getBundleStats",
                json!([{"bundleHash": bundle_id, "blockNumber": block_number}]),
            )
            .await?;
        Ok(result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_targets_hex_block() {
        let bundle = EvmBundle::for_block(vec!["0xabc".to_string()], 18_000_001);
        assert_eq!(bundle.block_number, "0x112a881");
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["txs"][0], "0xabc");
        // Empty optional fields stay off the wire.
        assert!(json.get("minTimestamp").is_none());
        assert!(json.get("revertingTxHashes").is_none());
    }

    #[test]
    fn test_stats_terminal_detection() {
        let landed = EvmBundleStats {
            status: None,
            block_number: Some(1),
        };
        assert!(landed.landed() && !landed.failed());

        let failed = EvmBundleStats {
            status: Some("FAILED".to_string()),
            block_number: None,
        };
        assert!(failed.failed() && !failed.landed());

        let pending = EvmBundleStats::default();
        assert!(!pending.landed() && !pending.failed());
    }

    #[test]
    fn test_unknown_chain_has_no_endpoint() {
        let client = FlashbotsClient::new(
            HashMap::from([("ethereum".to_string(), "https://relay.example".to_string())]),
            None,
        )
        .unwrap();
        assert!(client.supports_chain("Ethereum"));
        assert!(!client.supports_chain("base"));
        assert!(matches!(
            client.url_for("base"),
            Err(RelayError::NoEndpoint(_))
        ));
    }
}
