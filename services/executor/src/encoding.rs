//! Strategy call-data encoding, shared between simulation and submission.
//!
//! Every submitted transaction must carry exactly the call-data that was
//! simulated, so there is one encoder and both sides use it. Parameter order
//! is part of the contract with the on-chain artifact:
//!
//! - `executeCrossDexArbitrage(asset, amount, sourceDex, targetDex, minProfit)`
//! - `executeMultiHopArbitrage(asset, amount, path[], minProfit)`
//! - `executeTriangularArbitrage(asset, amount, path[], minProfit)`
//!
//! `MevRouted` trades use the CrossDex entry point; routing happens off-chain.

use ethers::abi::{Abi, Token};
use ethers::types::{Address, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use types::{Opportunity, StrategyParams};

pub const FN_CROSS_DEX: &str = "executeCrossDexArbitrage";
pub const FN_MULTI_HOP: &str = "executeMultiHopArbitrage";
pub const FN_TRIANGULAR: &str = "executeTriangularArbitrage";

/// Loaned assets are scaled as 18-decimal tokens at build time.
const WEI_DECIMALS: u32 = 18;
const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("invalid address {0}")]
    BadAddress(String),
    #[error("negative amount cannot be scaled to wei")]
    NegativeAmount,
    #[error("amount overflows wei scaling")]
    AmountOverflow,
    #[error("contract is missing function {0}")]
    UnknownFunction(&'static str),
    #[error("ABI encoding failed: {0}")]
    Abi(String),
}

/// Encoded entry-point invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyCall {
    pub function: &'static str,
    pub data: Vec<u8>,
}

/// Scale a human-readable decimal amount to integer base units.
pub fn to_base_units(value: Decimal, decimals: u32) -> Result<U256, EncodingError> {
    if value.is_sign_negative() {
        return Err(EncodingError::NegativeAmount);
    }
    let scale = Decimal::from(10u64.pow(decimals));
    let scaled = value.checked_mul(scale).ok_or(EncodingError::AmountOverflow)?;
    scaled
        .trunc()
        .to_u128()
        .map(U256::from)
        .ok_or(EncodingError::AmountOverflow)
}

/// `amount` (token units) → wei.
pub fn to_wei(amount: Decimal) -> Result<U256, EncodingError> {
    to_base_units(amount, WEI_DECIMALS)
}

/// Gas price in gwei → wei.
pub fn gwei_to_wei(gwei: Decimal) -> Result<U256, EncodingError> {
    to_base_units(gwei, 9)
}

/// SOL → lamports, truncating.
pub fn sol_to_lamports(sol: Decimal) -> Option<u64> {
    if sol.is_sign_negative() {
        return None;
    }
    sol.checked_mul(Decimal::from(LAMPORTS_PER_SOL))?
        .trunc()
        .to_u64()
}

pub fn parse_address(address: &str) -> Result<Address, EncodingError> {
    address
        .parse()
        .map_err(|_| EncodingError::BadAddress(address.to_string()))
}

fn path_tokens(path: &[String]) -> Result<Token, EncodingError> {
    let hops = path
        .iter()
        .map(|hop| parse_address(hop).map(Token::Address))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Token::Array(hops))
}

/// Encode the entry-point call for one opportunity. Deterministic: identical
/// inputs always produce identical call-data.
pub fn encode_strategy_call(
    abi: &Abi,
    opportunity: &Opportunity,
    params: &StrategyParams,
) -> Result<StrategyCall, EncodingError> {
    let asset = Token::Address(parse_address(&opportunity.asset)?);
    let amount_wei = Token::Uint(to_wei(opportunity.amount)?);
    let min_profit_wei = Token::Uint(to_wei(opportunity.min_profit)?);

    let (function, tokens) = match params {
        StrategyParams::CrossDex {
            source_dex,
            target_dex,
        }
        | StrategyParams::MevRouted {
            source_dex,
            target_dex,
        } => (
            FN_CROSS_DEX,
            vec![
                asset,
                amount_wei,
                Token::Address(parse_address(source_dex)?),
                Token::Address(parse_address(target_dex)?),
                min_profit_wei,
            ],
        ),
        StrategyParams::MultiHop { path } => (
            FN_MULTI_HOP,
            vec![asset, amount_wei, path_tokens(path)?, min_profit_wei],
        ),
        StrategyParams::Triangular { path } => (
            FN_TRIANGULAR,
            vec![asset, amount_wei, path_tokens(path)?, min_profit_wei],
        ),
    };

    let data = abi
        .function(function)
        .map_err(|_| EncodingError::UnknownFunction(function))?
        .encode_input(&tokens)
        .map_err(|e| EncodingError::Abi(e.to_string()))?;

    Ok(StrategyCall { function, data })
}
