//! # Executor Configuration - Runtime Parameter Management
//!
//! ## Purpose
//!
//! Configuration surface for the flashloan executor: bus connectivity, chain
//! RPC nodes, deployed contract bindings, the executor wallet, the ML gas
//! oracle, and MEV relay endpoints. Loaded from a camelCase JSON file with
//! environment variable overrides, then validated before any component is
//! constructed. A missing executor private key is fatal at startup.
//!
//! ## Integration Points
//!
//! - **Input Sources**: JSON configuration file (`EXECUTOR_CONFIG` or
//!   `config/executor.json`), environment variables
//! - **Output Destinations**: every executor component receives its slice of
//!   this structure at construction time; nothing re-reads the environment
//!   afterwards

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Default config file location when `EXECUTOR_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/executor.json";

/// Startup configuration failures. All fatal: the process refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Unreadable {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Unparseable {
        path: String,
        source: serde_json::Error,
    },
    #[error("executorWallet.privateKey is required (set EXECUTOR_WALLET_PRIVATE_KEY)")]
    MissingPrivateKey,
    #[error("invalid contract address for chain {chain}: {address}")]
    InvalidContractAddress { chain: String, address: String },
    #[error("duplicate node entry for chain {0}")]
    DuplicateNode(String),
    #[error("{0}")]
    Invalid(String),
}

/// Complete executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    pub nats: NatsConfig,
    /// Chain RPC endpoints, one entry per chain.
    pub nodes: Vec<NodeConfig>,
    /// Deployed arbitrage contract bindings, one entry per chain.
    pub smart_contracts: Vec<SmartContractConfig>,
    pub executor_wallet: WalletConfig,
    pub ml_optimizer: MlOptimizerConfig,
    pub jito: JitoConfig,
    pub suave: SuaveConfig,
}

/// Bus connectivity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatsConfig {
    pub url: String,
    pub opportunity_subject: String,
    pub result_subject: String,
    pub use_jet_stream: bool,
    pub user: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

/// One chain RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub chain_name: String,
    pub rpc_url: String,
    pub chain_id: u64,
}

/// One deployed arbitrage contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartContractConfig {
    pub chain_name: String,
    pub contract_address: String,
    /// Inline contract ABI (standard JSON ABI array).
    pub abi: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    /// Hex-encoded executor signing key. Required.
    pub private_key: Option<String>,
}

/// ML bidding oracle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MlOptimizerConfig {
    pub base_url: String,
    pub gas_bidding_endpoint: String,
}

/// Solana bundle relay (Jito block engine).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JitoConfig {
    pub enabled: bool,
    pub bundle_url: String,
    pub auth_token: Option<String>,
    pub skip_preflight: bool,
    pub max_retries: u32,
}

/// EVM bundle relay endpoints (SUAVE-style builders), keyed by chain name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuaveConfig {
    pub builder_urls: HashMap<String, String>,
    pub auth_token: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig::default(),
            nodes: Vec::new(),
            smart_contracts: Vec::new(),
            executor_wallet: WalletConfig::default(),
            ml_optimizer: MlOptimizerConfig::default(),
            jito: JitoConfig::default(),
            suave: SuaveConfig::default(),
        }
    }
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            opportunity_subject: "magnus.opportunities.flashloan".to_string(),
            result_subject: "flashloan.result".to_string(),
            use_jet_stream: false,
            user: None,
            password: None,
            use_tls: false,
        }
    }
}

impl Default for MlOptimizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            gas_bidding_endpoint: "/api/v1/gas-bid".to_string(),
        }
    }
}

impl Default for JitoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bundle_url: "https://mainnet.block-engine.jito.wtf/api/v1/bundles".to_string(),
            auth_token: None,
            skip_preflight: true,
            max_retries: 3,
        }
    }
}

impl ExecutorConfig {
    /// Load from `EXECUTOR_CONFIG` (or the default path), apply environment
    /// overrides, and validate. The standard startup entry point.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("EXECUTOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if std::path::Path::new(&path).exists() {
            info!("📂 Loading executor config from {}", path);
            Self::from_file(&path)?
        } else {
            info!("No config file at {}, starting from defaults", path);
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file without env overrides.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Unparseable {
            path: path.to_string(),
            source,
        })
    }

    /// Environment overrides for deployment without editing the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("EXECUTOR_NATS_URL") {
            self.nats.url = url;
        }
        if let Ok(subject) = std::env::var("EXECUTOR_OPPORTUNITY_SUBJECT") {
            self.nats.opportunity_subject = subject;
        }
        if let Ok(key) = std::env::var("EXECUTOR_WALLET_PRIVATE_KEY") {
            self.executor_wallet.private_key = Some(key);
        }
        if let Ok(base_url) = std::env::var("EXECUTOR_ML_OPTIMIZER_URL") {
            self.ml_optimizer.base_url = base_url;
        }
        if let Ok(bundle_url) = std::env::var("EXECUTOR_JITO_BUNDLE_URL") {
            self.jito.bundle_url = bundle_url;
        }
    }

    /// Validate the fatal-at-startup rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.executor_wallet.private_key {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingPrivateKey),
        }

        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.chain_name.to_lowercase()) {
                return Err(ConfigError::DuplicateNode(node.chain_name.clone()));
            }
            if node.rpc_url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "empty rpcUrl for chain {}",
                    node.chain_name
                )));
            }
        }

        for contract in &self.smart_contracts {
            if contract.contract_address.parse::<Address>().is_err() {
                return Err(ConfigError::InvalidContractAddress {
                    chain: contract.chain_name.clone(),
                    address: contract.contract_address.clone(),
                });
            }
        }

        Ok(())
    }

    /// Builder URL for the EVM bundle path on `chain`, when configured.
    pub fn builder_url(&self, chain_name: &str) -> Option<&str> {
        self.suave
            .builder_urls
            .get(&chain_name.to_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_json() -> String {
        r#"{
            "nats": {"url": "nats://bus:4222", "opportunitySubject": "flashloan.opportunity.*", "useJetStream": true},
            "nodes": [
                {"chainName": "ethereum", "rpcUrl": "https://eth.example", "chainId": 1},
                {"chainName": "solana", "rpcUrl": "https://sol.example", "chainId": 101}
            ],
            "smartContracts": [
                {"chainName": "ethereum",
                 "contractAddress": "0x0000000000000000000000000000000000000001",
                 "abi": []}
            ],
            "executorWallet": {"privateKey": "0x0123"},
            "mlOptimizer": {"baseUrl": "http://oracle:8090", "gasBiddingEndpoint": "/bid"},
            "suave": {"builderUrls": {"ethereum": "https://relay.example"}}
        }"#
        .to_string()
    }

    #[test]
    fn test_parse_camel_case_surface() {
        let config: ExecutorConfig = serde_json::from_str(&minimal_json()).unwrap();
        assert_eq!(config.nats.url, "nats://bus:4222");
        assert!(config.nats.use_jet_stream);
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].chain_id, 1);
        assert_eq!(config.ml_optimizer.gas_bidding_endpoint, "/bid");
        assert_eq!(config.builder_url("Ethereum"), Some("https://relay.example"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_private_key_is_fatal() {
        let mut config: ExecutorConfig = serde_json::from_str(&minimal_json()).unwrap();
        config.executor_wallet.private_key = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingPrivateKey)
        ));
    }

    #[test]
    fn test_invalid_contract_address_rejected() {
        let mut config: ExecutorConfig = serde_json::from_str(&minimal_json()).unwrap();
        config.smart_contracts[0].contract_address = "not-an-address".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidContractAddress { .. })
        ));
    }

    #[test]
    fn test_duplicate_nodes_rejected() {
        let mut config: ExecutorConfig = serde_json::from_str(&minimal_json()).unwrap();
        config.nodes.push(NodeConfig {
            chain_name: "Ethereum".to_string(),
            rpc_url: "https://other.example".to_string(),
            chain_id: 1,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_json().as_bytes()).unwrap();
        let config = ExecutorConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.nodes[1].chain_name, "solana");
    }
}
