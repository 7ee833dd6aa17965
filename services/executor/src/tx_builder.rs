//! # Tx Builder/Signer - Signed Transaction Assembly
//!
//! ## Purpose
//!
//! Turns a profitable opportunity plus its gas bid into a raw signed
//! transaction hex string. The call-data comes from the same encoder the
//! simulator used, so the submitted bytes are exactly the simulated bytes.
//! The nonce is fetched per call - there is deliberately no cross-run nonce
//! reservation in this executor.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::bindings::ContractRegistry;
use crate::chain::{ChainRpc, GatewayError};
use crate::encoding::{self, EncodingError};
use crate::gas_bid::GasBid;
use types::{Opportunity, StrategyParams};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid executor private key")]
    BadKey,
    #[error("no contract binding for chain {0}")]
    MissingBinding(String),
    #[error("unknown chain: {0}")]
    UnknownChain(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("signing failed: {0}")]
    Signing(String),
}

pub struct TxBuilder {
    gateway: Arc<dyn ChainRpc>,
    registry: Arc<ContractRegistry>,
    wallet: LocalWallet,
}

impl TxBuilder {
    pub fn new(
        gateway: Arc<dyn ChainRpc>,
        registry: Arc<ContractRegistry>,
        private_key: &str,
    ) -> Result<Self, BuildError> {
        let wallet = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|_| BuildError::BadKey)?;
        Ok(Self {
            gateway,
            registry,
            wallet,
        })
    }

    /// Executor address used as `from` for nonces and simulated calls.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Assemble and sign the transaction, returning `0x`-prefixed raw hex.
    pub async fn build_and_sign(
        &self,
        opportunity: &Opportunity,
        params: &StrategyParams,
        bid: &GasBid,
    ) -> Result<String, BuildError> {
        let chain_id = self
            .gateway
            .chain_id(&opportunity.chain_name)
            .ok_or_else(|| BuildError::UnknownChain(opportunity.chain_name.clone()))?;
        let binding = self
            .registry
            .get(&opportunity.chain_name)
            .ok_or_else(|| BuildError::MissingBinding(opportunity.chain_name.clone()))?;

        let call = encoding::encode_strategy_call(&binding.abi, opportunity, params)?;
        let nonce = self
            .gateway
            .transaction_count(&opportunity.chain_name, self.wallet.address())
            .await?;

        let request = TransactionRequest::new()
            .to(binding.address)
            .data(call.data)
            .value(U256::zero())
            .gas(bid.gas_limit)
            .gas_price(encoding::gwei_to_wei(bid.gas_price_gwei)?)
            .nonce(nonce)
            .chain_id(chain_id);
        let tx: TypedTransaction = request.into();

        let wallet = self.wallet.clone().with_chain_id(chain_id);
        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| BuildError::Signing(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        debug!(
            "⚡ Built {} tx for {} (nonce {}, {} gas @ {} gwei)",
            call.function, opportunity.id, nonce, bid.gas_limit, bid.gas_price_gwei
        );
        Ok(format!("0x{}", hex::encode(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::standard_arbitrage_abi;
    use crate::chain::{CallRequest, ReceiptInfo};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use types::ci;

    // Well-known throwaway development key.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct StaticChain;

    #[async_trait]
    impl ChainRpc for StaticChain {
        fn chain_id(&self, chain: &str) -> Option<u64> {
            (chain == "ethereum").then_some(1)
        }
        async fn block_number(&self, _chain: &str) -> Result<u64, GatewayError> {
            Ok(100)
        }
        async fn simulate_call(
            &self,
            _chain: &str,
            _call: &CallRequest,
        ) -> Result<Vec<u8>, GatewayError> {
            Ok(Vec::new())
        }
        async fn send_raw_transaction(
            &self,
            _chain: &str,
            _signed_hex: &str,
        ) -> Result<String, GatewayError> {
            Ok("0x00".to_string())
        }
        async fn transaction_count(
            &self,
            _chain: &str,
            _address: Address,
        ) -> Result<u64, GatewayError> {
            Ok(7)
        }
        async fn receipt(
            &self,
            _chain: &str,
            _tx_hash: &str,
        ) -> Result<Option<ReceiptInfo>, GatewayError> {
            Ok(None)
        }
    }

    fn builder() -> TxBuilder {
        let registry = ContractRegistry::default().with_binding(
            "ethereum",
            "0x000000000000000000000000000000000000dEaD"
                .parse()
                .unwrap(),
            standard_arbitrage_abi(),
        );
        TxBuilder::new(Arc::new(StaticChain), Arc::new(registry), TEST_KEY).unwrap()
    }

    fn opportunity() -> Opportunity {
        ci::from_str(
            r#"{"id": "b1", "chain": "ethereum",
                "asset": "0x1111111111111111111111111111111111111111",
                "amount": 10, "minProfit": 1, "expectedProfit": 2,
                "strategy": "CrossDex",
                "sourceDex": "0x2222222222222222222222222222222222222222",
                "targetDex": "0x3333333333333333333333333333333333333333"}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_garbage_key() {
        let registry = Arc::new(ContractRegistry::default());
        assert!(matches!(
            TxBuilder::new(Arc::new(StaticChain), registry, "not-a-key"),
            Err(BuildError::BadKey)
        ));
    }

    #[tokio::test]
    async fn test_build_and_sign_produces_hex() {
        let opp = opportunity();
        let params = opp.strategy_params().unwrap();
        let bid = GasBid {
            gas_price_gwei: dec!(50),
            gas_limit: 300_000,
            estimated_cost_usd: dec!(25),
        };

        let signed = builder().build_and_sign(&opp, &params, &bid).await.unwrap();
        assert!(signed.starts_with("0x"));
        assert!(hex::decode(signed.trim_start_matches("0x")).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_chain_rejected() {
        let mut opp = opportunity();
        opp.chain_name = "unknownnet".to_string();
        let params = opp.strategy_params().unwrap();
        let bid = GasBid {
            gas_price_gwei: dec!(50),
            gas_limit: 300_000,
            estimated_cost_usd: dec!(25),
        };
        assert!(matches!(
            builder().build_and_sign(&opp, &params, &bid).await,
            Err(BuildError::UnknownChain(_))
        ));
    }
}
