//! Outbound records: execution results, status updates, bundle outcomes and
//! the learning-feed projection.
//!
//! `ExecutionResult` is the single durable end-of-run record:
//! one per opportunity, published on `flashloan.result.<chain>` and projected
//! into the training feed. Timestamps are Unix nanoseconds captured by the
//! pipeline; latencies are derived only in the projection so the raw record
//! stays reconcilable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::opportunity::{MevProvider, Opportunity, StrategyKind};

/// Low-cardinality pipeline status, published on every observable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Received,
    Simulating,
    Submitting,
    SubmittingMev,
    Pending,
    Confirmed,
    Failed,
}

/// Ephemeral progress notification for `flashloan.status.<opportunity_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub opportunity_id: String,
    pub status: StatusTag,
    pub timestamp_ns: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The single end-of-run record for one opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub opportunity_id: String,
    pub chain_name: String,
    pub strategy: StrategyKind,
    pub success: bool,

    pub transaction_hash: Option<String>,
    pub block_number: Option<u64>,

    // Gas / profit reconciliation.
    pub gas_price_gwei: Option<Decimal>,
    pub gas_limit: Option<u64>,
    pub gas_cost_usd: Option<Decimal>,
    pub flash_loan_fee_usd: Option<Decimal>,
    pub expected_profit_usd: Decimal,
    /// Net profit estimate after gas and flash-loan fee.
    pub estimated_profit_usd: Option<Decimal>,
    pub reason: Option<String>,

    // MEV attribution.
    pub mev_provider: Option<MevProvider>,
    pub bundle_id: Option<String>,
    pub tip_lamports: Option<u64>,
    /// Reserved for downstream analysis; not computed by the executor.
    #[serde(default)]
    pub was_frontrun: bool,
    #[serde(default)]
    pub was_backrun: bool,

    // Source tracking echoed from the opportunity.
    pub signal_id: Option<String>,
    pub strategy_name: Option<String>,
    pub source_exchange: Option<String>,
    pub target_exchange: Option<String>,

    // Raw pipeline timestamps, Unix nanoseconds.
    pub received_ns: u64,
    pub sim_started_ns: Option<u64>,
    pub sim_completed_ns: Option<u64>,
    pub submitted_ns: Option<u64>,
    pub confirmed_ns: Option<u64>,
}

impl ExecutionResult {
    /// Skeleton record carrying everything known before the run starts.
    /// The pipeline fills the rest in as the run progresses.
    pub fn pending(opportunity: &Opportunity, received_ns: u64) -> Self {
        Self {
            opportunity_id: opportunity.id.clone(),
            chain_name: opportunity.chain_name.clone(),
            strategy: opportunity.strategy,
            success: false,
            transaction_hash: None,
            block_number: None,
            gas_price_gwei: None,
            gas_limit: None,
            gas_cost_usd: None,
            flash_loan_fee_usd: None,
            expected_profit_usd: opportunity.expected_profit,
            estimated_profit_usd: None,
            reason: None,
            mev_provider: None,
            bundle_id: None,
            tip_lamports: None,
            was_frontrun: false,
            was_backrun: false,
            signal_id: opportunity.signal_id.clone(),
            strategy_name: opportunity.strategy_name.clone(),
            source_exchange: opportunity.source_exchange.clone(),
            target_exchange: opportunity.target_exchange.clone(),
            received_ns,
            sim_started_ns: None,
            sim_completed_ns: None,
            submitted_ns: None,
            confirmed_ns: None,
        }
    }

    /// Flatten into the analyst-friendly learning-feed shape.
    pub fn learning_record(&self) -> LearningRecord {
        let latency_ms = |start: u64, end: Option<u64>| {
            end.filter(|end| *end >= start)
                .map(|end| (end - start) as f64 / 1e6)
        };
        LearningRecord {
            opportunity_id: self.opportunity_id.clone(),
            chain_name: self.chain_name.clone(),
            strategy: self.strategy,
            success: self.success,
            expected_profit_usd: self.expected_profit_usd,
            estimated_profit_usd: self.estimated_profit_usd,
            gas_cost_usd: self.gas_cost_usd,
            flash_loan_fee_usd: self.flash_loan_fee_usd,
            mev_provider: self.mev_provider,
            reason: self.reason.clone(),
            signal_id: self.signal_id.clone(),
            strategy_name: self.strategy_name.clone(),
            total_latency_ms: latency_ms(self.received_ns, self.confirmed_ns),
            simulation_latency_ms: self
                .sim_started_ns
                .and_then(|start| latency_ms(start, self.sim_completed_ns)),
        }
    }
}

/// Flat projection of [`ExecutionResult`] for `mloptimizer.training.flashloan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningRecord {
    pub opportunity_id: String,
    pub chain_name: String,
    pub strategy: StrategyKind,
    pub success: bool,
    pub expected_profit_usd: Decimal,
    pub estimated_profit_usd: Option<Decimal>,
    pub gas_cost_usd: Option<Decimal>,
    pub flash_loan_fee_usd: Option<Decimal>,
    pub mev_provider: Option<MevProvider>,
    pub reason: Option<String>,
    pub signal_id: Option<String>,
    pub strategy_name: Option<String>,
    pub total_latency_ms: Option<f64>,
    pub simulation_latency_ms: Option<f64>,
}

/// Per-provider bundle record for `mev.bundle.result.<provider>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutcome {
    pub bundle_id: String,
    pub provider: MevProvider,
    pub chain_name: String,
    pub opportunity_id: String,
    pub landed: bool,
    pub block_number: Option<u64>,
    pub tip_lamports: Option<u64>,
    pub submitted_ns: u64,
    pub resolved_ns: u64,
    pub reason: Option<String>,
}
