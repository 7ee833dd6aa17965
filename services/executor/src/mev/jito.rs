//! Solana bundle relay client (Jito block engine).
//!
//! Speaks the block engine's JSON-RPC surface: `sendBundle` with
//! base64-encoded transactions, `getBundleStatuses` for the inclusion poll,
//! `getTipAccounts`, and the relay's tip-floor endpoint for the lamport tip
//! estimate the coordinator scales and clamps.

use async_trait::async_trait;
use base64::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::RelayError;
use config::JitoConfig;
use types::ci;

const RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Lamport tip percentiles reported by the relay's tip oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TipEstimate {
    pub min: u64,
    pub median: u64,
    pub p75: u64,
    pub p95: u64,
    pub recommended: u64,
}

/// Terminal-or-not bundle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolanaBundleStatus {
    Pending,
    Landed { slot: u64 },
    Failed { reason: String },
}

/// Solana bundle relay seam.
#[async_trait]
pub trait SolanaBundleRelay: Send + Sync {
    async fn tip_estimate(&self) -> Result<TipEstimate, RelayError>;

    async fn tip_accounts(&self) -> Result<Vec<String>, RelayError>;

    /// Submit base64-encoded signed transactions; returns the bundle id.
    async fn send_bundle(
        &self,
        transactions: Vec<String>,
        tip_lamports: u64,
    ) -> Result<String, RelayError>;

    async fn bundle_status(&self, bundle_id: &str) -> Result<SolanaBundleStatus, RelayError>;
}

/// Encode a raw signed transaction for bundle submission.
pub fn encode_transaction_base64(signed_hex: &str) -> Result<String, RelayError> {
    let raw = hex::decode(signed_hex.trim_start_matches("0x"))
        .map_err(|e| RelayError::Malformed(format!("signed transaction is not hex: {e}")))?;
    Ok(BASE64_STANDARD.encode(raw))
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

#[derive(Debug, Deserialize)]
struct StatusesResult {
    #[serde(default)]
    value: Vec<BundleStatusEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleStatusEntry {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "landed_slot", alias = "landedslot")]
    landed_slot: Option<u64>,
    #[serde(default)]
    err: Option<serde_json::Value>,
}

/// Production client against the Jito block engine.
pub struct JitoClient {
    client: reqwest::Client,
    bundle_url: String,
    tip_floor_url: String,
    auth_token: Option<String>,
    skip_preflight: bool,
    max_retries: u32,
}

impl JitoClient {
    pub fn new(config: &JitoConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RelayError::Transport(format!("HTTP client construction: {e}")))?;
        let bundle_url = config.bundle_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            tip_floor_url: format!("{bundle_url}/tip_floor"),
            bundle_url,
            auth_token: config.auth_token.clone(),
            skip_preflight: config.skip_preflight,
            max_retries: config.max_retries,
        })
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RelayError> {
        let mut request = self.client.post(&self.bundle_url).json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }));
        if let Some(token) = &self.auth_token {
            request = request.header("x-jito-auth", token);
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
        envelope
            .result
            .ok_or_else(|| RelayError::Malformed(format!("{method} returned no result")))
    }
}

#[async_trait]
impl SolanaBundleRelay for JitoClient {
    async fn tip_estimate(&self) -> Result<TipEstimate, RelayError> {
        let response = self
            .client
            .get(&self.tip_floor_url)
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
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        // The oracle answers either a bare estimate object or a one-element
        // array of them.
        ci::from_slice::<TipEstimate>(&body)
            .or_else(|_| {
                ci::from_slice::<Vec<TipEstimate>>(&body).and_then(|mut estimates| {
                    if estimates.is_empty() {
                        // Round-trip an empty-array error through serde.
                        serde_json::from_str::<TipEstimate>("null")
                    } else {
                        Ok(estimates.remove(0))
                    }
                })
            })
            .map_err(|e| RelayError::Malformed(format!("tip floor response: {e}")))
    }

    async fn tip_accounts(&self) -> Result<Vec<String>, RelayError> {
        self.rpc("getTipAccounts", json!([])).await
    }

    async fn send_bundle(
        &self,
        transactions: Vec<String>,
        tip_lamports: u64,
    ) -> Result<String, RelayError> {
        debug!(
            "📦 Submitting {}-tx bundle to {} (tip {} lamports)",
            transactions.len(),
            self.bundle_url,
            tip_lamports
        );
        self.rpc(
            "sendBundle",
            json!([{
                "transactions": transactions,
                "tipLamports": tip_lamports,
                "skipPreflight": self.skip_preflight,
                "maxRetries": self.max_retries,
            }]),
        )
        .await
    }

    async fn bundle_status(&self, bundle_id: &str) -> Result<SolanaBundleStatus, RelayError> {
        let result: StatusesResult = self.rpc("getBundleStatuses", json!([[bundle_id]])).await?;
        let Some(entry) = result.value.into_iter().next() else {
            return Ok(SolanaBundleStatus::Pending);
        };

        if let Some(slot) = entry.landed_slot {
            return Ok(SolanaBundleStatus::Landed { slot });
        }
        match entry.status.as_deref() {
            Some(status) if status.eq_ignore_ascii_case("landed") => {
                Ok(SolanaBundleStatus::Landed { slot: 0 })
            }
            Some(status)
                if status.eq_ignore_ascii_case("failed")
                    || status.eq_ignore_ascii_case("invalid") =>
            {
                Ok(SolanaBundleStatus::Failed {
                    reason: entry
                        .err
                        .map(|err| err.to_string())
                        .unwrap_or_else(|| status.to_string()),
                })
            }
            _ => Ok(SolanaBundleStatus::Pending),
        }
    }
}
