//! Inbound arbitrage opportunity model.
//!
//! Wire shape is flat camelCase JSON with one strategy-parameter set present
//! per strategy variant. [`Opportunity::strategy_params`] lifts the flat shape
//! into the tagged [`StrategyParams`] enum and enforces the per-variant
//! invariants, so downstream code never touches half-populated fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MEV bundle relay family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MevProvider {
    #[serde(alias = "Jito", alias = "JITO")]
    Jito,
    #[serde(alias = "Suave", alias = "SUAVE")]
    Suave,
}

impl MevProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            MevProvider::Jito => "jito",
            MevProvider::Suave => "suave",
        }
    }
}

impl std::fmt::Display for MevProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arbitrage strategy discriminant as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(alias = "crossdex", alias = "cross_dex", alias = "CROSSDEX")]
    CrossDex,
    #[serde(alias = "multihop", alias = "multi_hop", alias = "MULTIHOP")]
    MultiHop,
    #[serde(alias = "triangular", alias = "TRIANGULAR")]
    Triangular,
    #[serde(alias = "mevrouted", alias = "mev_routed", alias = "MEVROUTED")]
    MevRouted,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CrossDex => "CrossDex",
            StrategyKind::MultiHop => "MultiHop",
            StrategyKind::Triangular => "Triangular",
            StrategyKind::MevRouted => "MevRouted",
        }
    }
}

/// Validated strategy parameters, one variant per [`StrategyKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyParams {
    CrossDex { source_dex: String, target_dex: String },
    MultiHop { path: Vec<String> },
    Triangular { path: Vec<String> },
    /// CrossDex trade flagged for MEV-bundle routing.
    MevRouted { source_dex: String, target_dex: String },
}

/// Opportunity validation failures (all policy rejections, never faults).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpportunityError {
    #[error("strategy {strategy} requires field {field}")]
    MissingField {
        strategy: &'static str,
        field: &'static str,
    },
    #[error("triangular path must contain at least 3 hops, got {0}")]
    PathTooShort(usize),
    #[error("triangular path must start and end on the same token")]
    OpenTriangle,
}

/// An arbitrage opportunity as received from the bus.
///
/// Unknown fields are ignored; optional fields default. Keys are matched
/// case-insensitively through [`crate::ci`], hence the folded aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub id: String,
    #[serde(alias = "chainname", alias = "chain")]
    pub chain_name: String,
    /// On-chain address of the loaned token.
    pub asset: String,
    /// Loan size, human scale. Wei conversion happens at build time.
    pub amount: Decimal,
    pub strategy: StrategyKind,

    // Strategy parameters, one set present per variant.
    #[serde(default, alias = "sourcedex")]
    pub source_dex: Option<String>,
    #[serde(default, alias = "targetdex")]
    pub target_dex: Option<String>,
    #[serde(default, deserialize_with = "de_path")]
    pub path: Option<Vec<String>>,

    /// Profit floor the on-chain function must enforce.
    #[serde(default, alias = "minprofit")]
    pub min_profit: Decimal,
    #[serde(default, alias = "expectedprofit")]
    pub expected_profit: Decimal,
    #[serde(default, alias = "confidencescore")]
    pub confidence_score: Option<f64>,

    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, alias = "expiresatnanos")]
    pub expires_at_nanos: Option<u64>,

    // Market context. Advisory feature values; never feed financial math
    // except aoi_score, which scales the MEV tip and therefore stays decimal.
    #[serde(default, alias = "spreadbps")]
    pub spread_bps: Option<f64>,
    #[serde(default, alias = "orderbookimbalance")]
    pub order_book_imbalance: Option<f64>,
    #[serde(default, alias = "volatilitypercent")]
    pub volatility_percent: Option<f64>,
    #[serde(default, alias = "aoiscore")]
    pub aoi_score: Option<Decimal>,
    #[serde(default, alias = "marketregime")]
    pub market_regime: Option<String>,

    // MEV preferences.
    #[serde(default, alias = "usemev")]
    pub use_mev: bool,
    #[serde(default, alias = "preferredmevprovider")]
    pub preferred_mev_provider: Option<MevProvider>,
    /// Tip ceiling in SOL for the Solana bundle path.
    #[serde(default, alias = "maxmevtip")]
    pub max_mev_tip: Option<Decimal>,
    #[serde(default, alias = "targetbundleposition")]
    pub target_bundle_position: Option<u32>,

    // Risk parameters.
    #[serde(default, alias = "maxslippagebps")]
    pub max_slippage_bps: Option<u32>,
    #[serde(default, alias = "maxgaspricegwei")]
    pub max_gas_price_gwei: Option<Decimal>,
    #[serde(default, alias = "allowpartialfill")]
    pub allow_partial_fill: bool,

    // Source tracking, echoed into results for the learning system.
    #[serde(default, alias = "signalid")]
    pub signal_id: Option<String>,
    #[serde(default, alias = "strategyname")]
    pub strategy_name: Option<String>,
    #[serde(default, alias = "sourceexchange")]
    pub source_exchange: Option<String>,
    #[serde(default, alias = "targetexchange")]
    pub target_exchange: Option<String>,
}

/// Accept `path` either as a JSON array or as a comma-separated string.
fn de_path<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PathRepr {
        List(Vec<String>),
        Joined(String),
    }

    let repr: Option<PathRepr> = Option::deserialize(deserializer)?;
    Ok(repr.map(|repr| match repr {
        PathRepr::List(list) => list,
        PathRepr::Joined(joined) => joined
            .split(',')
            .map(|hop| hop.trim().to_string())
            .filter(|hop| !hop.is_empty())
            .collect(),
    }))
}

impl Opportunity {
    /// Lift the flat wire shape into validated strategy parameters.
    pub fn strategy_params(&self) -> Result<StrategyParams, OpportunityError> {
        let strategy = self.strategy.as_str();
        let dex_pair = || -> Result<(String, String), OpportunityError> {
            let source = self
                .source_dex
                .clone()
                .ok_or(OpportunityError::MissingField {
                    strategy,
                    field: "sourceDex",
                })?;
            let target = self
                .target_dex
                .clone()
                .ok_or(OpportunityError::MissingField {
                    strategy,
                    field: "targetDex",
                })?;
            Ok((source, target))
        };
        let path = || -> Result<Vec<String>, OpportunityError> {
            self.path.clone().ok_or(OpportunityError::MissingField {
                strategy,
                field: "path",
            })
        };

        match self.strategy {
            StrategyKind::CrossDex => {
                let (source_dex, target_dex) = dex_pair()?;
                Ok(StrategyParams::CrossDex {
                    source_dex,
                    target_dex,
                })
            }
            StrategyKind::MevRouted => {
                let (source_dex, target_dex) = dex_pair()?;
                Ok(StrategyParams::MevRouted {
                    source_dex,
                    target_dex,
                })
            }
            StrategyKind::MultiHop => Ok(StrategyParams::MultiHop { path: path()? }),
            StrategyKind::Triangular => {
                let path = path()?;
                if path.len() < 3 {
                    return Err(OpportunityError::PathTooShort(path.len()));
                }
                let first = path.first().map(|hop| hop.to_lowercase());
                let last = path.last().map(|hop| hop.to_lowercase());
                if first != last {
                    return Err(OpportunityError::OpenTriangle);
                }
                Ok(StrategyParams::Triangular { path })
            }
        }
    }

    /// Absolute expiry in Unix nanoseconds, from whichever deadline field the
    /// producer populated.
    pub fn deadline_ns(&self) -> Option<u64> {
        self.expires_at_nanos.or_else(|| {
            self.deadline
                .and_then(|deadline| deadline.timestamp_nanos_opt())
                .and_then(|nanos| u64::try_from(nanos).ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci;
    use rust_decimal_macros::dec;

    fn cross_dex_json() -> &'static str {
        r#"{
            "id": "E1",
            "chain": "ethereum",
            "asset": "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            "amount": 10000,
            "strategy": "CrossDex",
            "sourceDex": "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
            "targetDex": "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F",
            "minProfit": 500,
            "expectedProfit": 600,
            "useMev": false
        }"#
    }

    #[test]
    fn test_cross_dex_ingestion() {
        let opp: Opportunity = ci::from_str(cross_dex_json()).unwrap();
        assert_eq!(opp.id, "E1");
        assert_eq!(opp.chain_name, "ethereum");
        assert_eq!(opp.amount, dec!(10000));
        assert_eq!(opp.expected_profit, dec!(600));
        assert!(!opp.use_mev);
        assert!(matches!(
            opp.strategy_params().unwrap(),
            StrategyParams::CrossDex { .. }
        ));
    }

    #[test]
    fn test_snake_case_ingestion() {
        let json = r#"{
            "id": "x", "chain_name": "polygon", "asset": "0xA", "amount": "1.5",
            "strategy": "MultiHop", "path": ["0xA", "0xB", "0xA"],
            "min_profit": 1, "expected_profit": 2,
            "use_mev": true, "preferred_mev_provider": "jito", "max_mev_tip": 0.5
        }"#;
        let opp: Opportunity = ci::from_str(json).unwrap();
        assert_eq!(opp.chain_name, "polygon");
        assert_eq!(opp.amount, dec!(1.5));
        assert_eq!(opp.preferred_mev_provider, Some(MevProvider::Jito));
        assert_eq!(opp.max_mev_tip, Some(dec!(0.5)));
    }

    #[test]
    fn test_path_accepts_comma_joined_string() {
        let json = r#"{
            "id": "E2", "chain": "ethereum", "asset": "0xW", "amount": 100,
            "strategy": "MultiHop", "path": "0xWETH,0xUSDC,0xWETH",
            "minProfit": 5, "expectedProfit": 5
        }"#;
        let opp: Opportunity = ci::from_str(json).unwrap();
        assert_eq!(
            opp.path.as_deref(),
            Some(&["0xWETH".to_string(), "0xUSDC".into(), "0xWETH".into()][..])
        );
    }

    #[test]
    fn test_triangular_path_invariants() {
        let mut opp: Opportunity = ci::from_str(cross_dex_json()).unwrap();
        opp.strategy = StrategyKind::Triangular;

        opp.path = Some(vec!["0xA".into(), "0xB".into()]);
        assert_eq!(
            opp.strategy_params(),
            Err(OpportunityError::PathTooShort(2))
        );

        opp.path = Some(vec!["0xA".into(), "0xB".into(), "0xC".into()]);
        assert_eq!(opp.strategy_params(), Err(OpportunityError::OpenTriangle));

        opp.path = Some(vec!["0xA".into(), "0xB".into(), "0xa".into()]);
        assert!(matches!(
            opp.strategy_params().unwrap(),
            StrategyParams::Triangular { .. }
        ));
    }

    #[test]
    fn test_missing_strategy_fields_rejected() {
        let json = r#"{
            "id": "x", "chain": "ethereum", "asset": "0xA", "amount": 1,
            "strategy": "CrossDex", "sourceDex": "0xS"
        }"#;
        let opp: Opportunity = ci::from_str(json).unwrap();
        assert_eq!(
            opp.strategy_params(),
            Err(OpportunityError::MissingField {
                strategy: "CrossDex",
                field: "targetDex"
            })
        );
    }

    #[test]
    fn test_deadline_prefers_nanos() {
        let mut opp: Opportunity = ci::from_str(cross_dex_json()).unwrap();
        assert_eq!(opp.deadline_ns(), None);
        opp.deadline = Some(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        assert_eq!(opp.deadline_ns(), Some(1_700_000_000_000_000_000));
        opp.expires_at_nanos = Some(42);
        assert_eq!(opp.deadline_ns(), Some(42));
    }
}
