//! # Gas Bidder - ML Bidding Oracle Round-Trip
//!
//! ## Purpose
//!
//! Prices each opportunity by asking the ML bidding oracle for a gas bid
//! (price, limit, USD cost estimate). The oracle owns gas strategy; the
//! executor only validates the bid and folds it into profit gating. Any
//! failure here is fatal for the current opportunity - the pipeline publishes
//! a failure result and moves on. There is no fallback bid: executing with a
//! made-up gas price would undermine the profit gate.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use config::MlOptimizerConfig;
use types::{ci, Opportunity};

const ORACLE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GasBidError {
    #[error("gas oracle transport failure: {0}")]
    Transport(String),
    #[error("gas oracle returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },
    #[error("gas oracle response malformed: {0}")]
    Malformed(String),
    #[error("gas oracle bid rejected: {0} must be positive")]
    NonPositive(&'static str),
}

/// A priced gas bid. Invariant: all fields positive and finite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasBid {
    #[serde(alias = "gaspricegwei")]
    pub gas_price_gwei: Decimal,
    #[serde(alias = "gaslimit")]
    pub gas_limit: u64,
    #[serde(alias = "estimatedcostusd")]
    pub estimated_cost_usd: Decimal,
}

impl GasBid {
    pub fn validate(&self) -> Result<(), GasBidError> {
        if self.gas_price_gwei <= Decimal::ZERO {
            return Err(GasBidError::NonPositive("gasPriceGwei"));
        }
        if self.gas_limit == 0 {
            return Err(GasBidError::NonPositive("gasLimit"));
        }
        if self.estimated_cost_usd <= Decimal::ZERO {
            return Err(GasBidError::NonPositive("estimatedCostUsd"));
        }
        Ok(())
    }
}

/// Oracle seam used by the pipeline.
#[async_trait]
pub trait GasOracle: Send + Sync {
    async fn get_bid(&self, opportunity: &Opportunity) -> Result<GasBid, GasBidError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GasBidRequest<'a> {
    chain_name: &'a str,
    asset: &'a str,
    amount: Decimal,
    expected_profit: Decimal,
}

/// Production oracle client against the ML optimizer HTTP endpoint.
pub struct MlGasBidder {
    client: reqwest::Client,
    endpoint: String,
}

impl MlGasBidder {
    pub fn new(config: &MlOptimizerConfig) -> Result<Self, GasBidError> {
        let client = reqwest::Client::builder()
            .timeout(ORACLE_TIMEOUT)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GasBidError::Transport(format!("HTTP client construction: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.base_url.trim_end_matches('/'),
                config.gas_bidding_endpoint
            ),
        })
    }
}

#[async_trait]
impl GasOracle for MlGasBidder {
    async fn get_bid(&self, opportunity: &Opportunity) -> Result<GasBid, GasBidError> {
        let request = GasBidRequest {
            chain_name: &opportunity.chain_name,
            asset: &opportunity.asset,
            amount: opportunity.amount,
            expected_profit: opportunity.expected_profit,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| GasBidError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GasBidError::BadStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GasBidError::Transport(e.to_string()))?;
        let bid: GasBid =
            ci::from_slice(&body).map_err(|e| GasBidError::Malformed(e.to_string()))?;
        bid.validate()?;

        debug!(
            "⛽ Gas bid for {}: {} gwei, {} gas, ${} estimated",
            opportunity.id, bid.gas_price_gwei, bid.gas_limit, bid.estimated_cost_usd
        );
        Ok(bid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bid_parses_case_insensitively() {
        for json in [
            r#"{"gasPriceGwei": 50, "gasLimit": 300000, "estimatedCostUsd": 25}"#,
            r#"{"gas_price_gwei": 50, "gas_limit": 300000, "estimated_cost_usd": 25}"#,
            r#"{"GASPRICEGWEI": 50, "GasLimit": 300000, "ESTIMATEDCOSTUSD": 25}"#,
        ] {
            let bid: GasBid = ci::from_str(json).unwrap();
            assert_eq!(bid.gas_price_gwei, dec!(50));
            assert_eq!(bid.gas_limit, 300_000);
            assert_eq!(bid.estimated_cost_usd, dec!(25));
            assert!(bid.validate().is_ok());
        }
    }

    #[test]
    fn test_non_positive_bids_rejected() {
        let bid = GasBid {
            gas_price_gwei: dec!(0),
            gas_limit: 300_000,
            estimated_cost_usd: dec!(25),
        };
        assert!(matches!(
            bid.validate(),
            Err(GasBidError::NonPositive("gasPriceGwei"))
        ));

        let bid = GasBid {
            gas_price_gwei: dec!(50),
            gas_limit: 0,
            estimated_cost_usd: dec!(25),
        };
        assert!(matches!(
            bid.validate(),
            Err(GasBidError::NonPositive("gasLimit"))
        ));

        let bid = GasBid {
            gas_price_gwei: dec!(50),
            gas_limit: 300_000,
            estimated_cost_usd: dec!(-1),
        };
        assert!(matches!(
            bid.validate(),
            Err(GasBidError::NonPositive("estimatedCostUsd"))
        ));
    }

    #[test]
    fn test_endpoint_join_avoids_double_slash() {
        let bidder = MlGasBidder::new(&MlOptimizerConfig {
            base_url: "http://oracle:8090/".to_string(),
            gas_bidding_endpoint: "/api/v1/gas-bid".to_string(),
        })
        .unwrap();
        assert_eq!(bidder.endpoint, "http://oracle:8090/api/v1/gas-bid");
    }
}
