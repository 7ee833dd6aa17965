//! # Simulator - Read-Only Execution Gating
//!
//! ## Purpose
//!
//! Decides whether an opportunity would succeed on-chain and remain
//! profitable after costs. Encodes the strategy entry point (the exact bytes
//! later submitted), runs it as an `eth_call` with the bid's gas parameters,
//! and computes net profit: expected profit minus the oracle's gas estimate
//! minus the 9 bps flash-loan fee.
//!
//! A revert is a negative business outcome and yields an infeasible outcome;
//! only transport/protocol faults propagate as errors. A "successful" call
//! whose return bytes do not decode per the bound function's output types is
//! treated as infeasible too - executor contracts always return the realized
//! profit word, so an undecodable return means the call did not do what the
//! encoder asked.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::bindings::ContractRegistry;
use crate::chain::{CallRequest, ChainRpc, GatewayError};
use crate::encoding::{self, EncodingError};
use crate::gas_bid::GasBid;
use ethers::types::Address;
use types::{Opportunity, StrategyParams};

/// Flash-loan fee: 9 bps of the loaned amount.
const FLASH_LOAN_FEE_RATE: Decimal = dec!(0.0009);

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("no contract binding for chain {0}")]
    MissingBinding(String),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Cost components deducted from the expected profit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostBreakdown {
    pub gas_usd: Decimal,
    pub flash_loan_fee_usd: Decimal,
}

/// Outcome of one simulation pass.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub feasible: bool,
    pub estimated_net_profit_usd: Decimal,
    pub cost_breakdown: CostBreakdown,
    /// Populated when the call reverted (or returned undecodable bytes).
    pub revert_reason: Option<String>,
    /// Call-data that was simulated; submission must reuse it byte-for-byte.
    pub call_data: Vec<u8>,
}

/// Flash-loan fee in USD terms for a given loan size.
pub fn flash_loan_fee_usd(amount: Decimal) -> Decimal {
    amount * FLASH_LOAN_FEE_RATE
}

/// Net profit after gas and flash-loan fee.
pub fn net_profit(expected_profit: Decimal, gas_usd: Decimal, amount: Decimal) -> Decimal {
    expected_profit - gas_usd - flash_loan_fee_usd(amount)
}

pub struct Simulator {
    gateway: Arc<dyn ChainRpc>,
    registry: Arc<ContractRegistry>,
    /// `from` address for simulated calls; the executor wallet.
    caller: Address,
}

impl Simulator {
    pub fn new(gateway: Arc<dyn ChainRpc>, registry: Arc<ContractRegistry>, caller: Address) -> Self {
        Self {
            gateway,
            registry,
            caller,
        }
    }

    /// Simulate one opportunity under the given gas bid.
    pub async fn simulate(
        &self,
        opportunity: &Opportunity,
        params: &StrategyParams,
        bid: &GasBid,
    ) -> Result<SimulationOutcome, SimulatorError> {
        let binding = self
            .registry
            .get(&opportunity.chain_name)
            .ok_or_else(|| SimulatorError::MissingBinding(opportunity.chain_name.clone()))?;

        let call = encoding::encode_strategy_call(&binding.abi, opportunity, params)?;
        let request = CallRequest {
            to: binding.address,
            data: call.data.clone(),
            gas: bid.gas_limit,
            gas_price_wei: encoding::gwei_to_wei(bid.gas_price_gwei)?,
            from: Some(self.caller),
        };

        let fee_usd = flash_loan_fee_usd(opportunity.amount);
        let costs = CostBreakdown {
            gas_usd: bid.estimated_cost_usd,
            flash_loan_fee_usd: fee_usd,
        };

        let returned = match self
            .gateway
            .simulate_call(&opportunity.chain_name, &request)
            .await
        {
            Ok(returned) => returned,
            Err(GatewayError::Revert { reason }) => {
                debug!(
                    "Simulation reverted for {}: {}",
                    opportunity.id,
                    reason.as_deref().unwrap_or("no reason")
                );
                return Ok(SimulationOutcome {
                    feasible: false,
                    estimated_net_profit_usd: Decimal::ZERO,
                    cost_breakdown: costs,
                    revert_reason: reason.or_else(|| Some("execution reverted".to_string())),
                    call_data: call.data,
                });
            }
            Err(other) => return Err(other.into()),
        };

        // Success only counts when the return decodes per the output types.
        let function = binding
            .abi
            .function(call.function)
            .map_err(|_| EncodingError::UnknownFunction(call.function))?;
        if function.decode_output(&returned).is_err() {
            warn!(
                "Simulation for {} returned {} undecodable bytes, treating as revert",
                opportunity.id,
                returned.len()
            );
            return Ok(SimulationOutcome {
                feasible: false,
                estimated_net_profit_usd: Decimal::ZERO,
                cost_breakdown: costs,
                revert_reason: Some("unparseable simulation return".to_string()),
                call_data: call.data,
            });
        }

        let net = net_profit(
            opportunity.expected_profit,
            bid.estimated_cost_usd,
            opportunity.amount,
        );
        debug!(
            "💰 Simulation for {}: expected ${} - gas ${} - fee ${} = net ${}",
            opportunity.id, opportunity.expected_profit, bid.estimated_cost_usd, fee_usd, net
        );

        Ok(SimulationOutcome {
            feasible: net > Decimal::ZERO,
            estimated_net_profit_usd: net,
            cost_breakdown: costs,
            revert_reason: None,
            call_data: call.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_flash_loan_fee_is_nine_bps() {
        assert_eq!(flash_loan_fee_usd(dec!(10000)), dec!(9.0000));
        assert_eq!(flash_loan_fee_usd(dec!(100)), dec!(0.0900));
    }

    #[test]
    fn test_net_profit_profitable_case() {
        // 600 expected - 25 gas - 9 fee = 566.
        assert_eq!(net_profit(dec!(600), dec!(25), dec!(10000)), dec!(566.0000));
    }

    #[test]
    fn test_net_profit_unprofitable_case() {
        // 5 expected - 40 gas - 0.09 fee = -35.09.
        assert_eq!(net_profit(dec!(5), dec!(40), dec!(100)), dec!(-35.0900));
    }
}
