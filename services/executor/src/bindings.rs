//! Contract binding table: chain name → deployed arbitrage contract + ABI.
//!
//! Built once at startup from `smartContracts[]` and shared read-only by the
//! simulator and the transaction builder. Entries that omit an ABI fall back
//! to the standard executor ABI, which carries exactly the three entry points
//! the encoder targets.

use ethers::abi::Abi;
use ethers::types::Address;
use std::collections::HashMap;
use thiserror::Error;

use config::SmartContractConfig;

/// Standard executor contract ABI used when a binding does not ship its own.
const STANDARD_ARBITRAGE_ABI: &str = r#"[
  {
    "type": "function",
    "name": "executeCrossDexArbitrage",
    "stateMutability": "nonpayable",
    "inputs": [
      {"name": "asset", "type": "address"},
      {"name": "amount", "type": "uint256"},
      {"name": "sourceDex", "type": "address"},
      {"name": "targetDex", "type": "address"},
      {"name": "minProfit", "type": "uint256"}
    ],
    "outputs": [{"name": "profit", "type": "uint256"}]
  },
  {
    "type": "function",
    "name": "executeMultiHopArbitrage",
    "stateMutability": "nonpayable",
    "inputs": [
      {"name": "asset", "type": "address"},
      {"name": "amount", "type": "uint256"},
      {"name": "path", "type": "address[]"},
      {"name": "minProfit", "type": "uint256"}
    ],
    "outputs": [{"name": "profit", "type": "uint256"}]
  },
  {
    "type": "function",
    "name": "executeTriangularArbitrage",
    "stateMutability": "nonpayable",
    "inputs": [
      {"name": "asset", "type": "address"},
      {"name": "amount", "type": "uint256"},
      {"name": "path", "type": "address[]"},
      {"name": "minProfit", "type": "uint256"}
    ],
    "outputs": [{"name": "profit", "type": "uint256"}]
  }
]"#;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid contract address for chain {chain}: {address}")]
    BadAddress { chain: String, address: String },
    #[error("invalid ABI for chain {chain}: {source}")]
    BadAbi {
        chain: String,
        source: serde_json::Error,
    },
}

/// One deployed contract the executor can call.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    pub address: Address,
    pub abi: Abi,
}

/// Immutable chain → binding table.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    bindings: HashMap<String, ContractBinding>,
}

/// The built-in executor ABI.
pub fn standard_arbitrage_abi() -> Abi {
    // The constant is compile-time known; parsing it cannot fail at runtime.
    serde_json::from_str(STANDARD_ARBITRAGE_ABI).expect("standard ABI is valid")
}

impl ContractRegistry {
    pub fn from_config(contracts: &[SmartContractConfig]) -> Result<Self, BindingError> {
        let mut bindings = HashMap::with_capacity(contracts.len());
        for contract in contracts {
            let address: Address =
                contract
                    .contract_address
                    .parse()
                    .map_err(|_| BindingError::BadAddress {
                        chain: contract.chain_name.clone(),
                        address: contract.contract_address.clone(),
                    })?;
            let abi = if contract.abi.is_null()
                || contract.abi.as_array().is_some_and(|abi| abi.is_empty())
            {
                standard_arbitrage_abi()
            } else {
                serde_json::from_value(contract.abi.clone()).map_err(|source| {
                    BindingError::BadAbi {
                        chain: contract.chain_name.clone(),
                        source,
                    }
                })?
            };
            bindings.insert(
                contract.chain_name.to_lowercase(),
                ContractBinding { address, abi },
            );
        }
        Ok(Self { bindings })
    }

    /// Insert a binding directly; used by wiring code and tests.
    pub fn with_binding(mut self, chain_name: &str, address: Address, abi: Abi) -> Self {
        self.bindings
            .insert(chain_name.to_lowercase(), ContractBinding { address, abi });
        self
    }

    pub fn get(&self, chain_name: &str) -> Option<&ContractBinding> {
        self.bindings.get(&chain_name.to_lowercase())
    }
}
