//! # Opportunity Pipeline - Per-Run State Machine
//!
//! ## Purpose
//!
//! Drives one opportunity from receipt to its single terminal publish:
//! receive → price gas → simulate → decide → build+sign → submit (standard or
//! MEV-routed) → await inclusion → publish. All mutable run state lives in
//! the [`PipelineRun`] owned by the driving task; collaborators are shared
//! read-only.
//!
//! ## Guarantees
//!
//! - Exactly one `ExecutionResult` is produced per opportunity; faults are
//!   converted into failure records, never propagated out of [`Pipeline::execute`].
//! - A status update is emitted on every observable transition, and the
//!   terminal status is published strictly after the final result.
//! - Nothing is submitted without a passing simulation of the same call-data
//!   and gas parameters, and never after the opportunity deadline.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chain::{ChainRpc, GatewayError};
use crate::gas_bid::{GasBidError, GasOracle};
use crate::mev::{MevCoordinator, MevOutcome};
use crate::now_ns;
use crate::simulator::{Simulator, SimulatorError};
use crate::tx_builder::{BuildError, TxBuilder};
use types::{BundleOutcome, ExecutionResult, Opportunity, StatusTag, StatusUpdate};

/// Standard-branch receipt polling parameters: every 2 s, up to 60 attempts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub receipt_poll_interval: Duration,
    pub receipt_poll_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receipt_poll_interval: Duration::from_secs(2),
            receipt_poll_attempts: 60,
        }
    }
}

/// Pipeline states. Wire-visible progress is the coarser [`StatusTag`] set;
/// the full set exists for fault attribution in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Received,
    Bidding,
    Simulating,
    Rejected,
    SubmittingStandard,
    SubmittingMev,
    Pending,
    Confirmed,
    Failed,
    TimedOut,
}

/// Faults that abort a run. Policy rejections are not faults; they short-
/// circuit with a reasoned record instead.
#[derive(Debug, Error)]
enum RunFault {
    #[error("gas bid failed: {0}")]
    GasBid(#[from] GasBidError),
    #[error("chain gateway failure: {0}")]
    Gateway(#[from] GatewayError),
    #[error("simulation failure: {0}")]
    Simulator(#[from] SimulatorError),
    #[error("transaction build failed: {0}")]
    Build(#[from] BuildError),
}

/// Ephemeral per-opportunity state. Created on receipt, destroyed after the
/// terminal publish.
struct PipelineRun {
    record: ExecutionResult,
    state: RunState,
    mev: Option<MevOutcome>,
}

impl PipelineRun {
    fn new(opportunity: &Opportunity, received_ns: u64) -> Self {
        Self {
            record: ExecutionResult::pending(opportunity, received_ns),
            state: RunState::Received,
            mev: None,
        }
    }

    fn set_state(&mut self, state: RunState) {
        debug!(
            "Run {}: {:?} → {:?}",
            self.record.opportunity_id, self.state, state
        );
        self.state = state;
    }

    fn reject(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        info!(
            "🚫 Rejected {}: {}",
            self.record.opportunity_id, reason
        );
        self.record.success = false;
        self.record.reason = Some(reason);
        self.set_state(RunState::Rejected);
    }
}

pub struct Pipeline {
    gateway: Arc<dyn ChainRpc>,
    oracle: Arc<dyn GasOracle>,
    simulator: Arc<Simulator>,
    builder: Arc<TxBuilder>,
    mev: Arc<MevCoordinator>,
    publisher: Arc<dyn crate::publisher::OutcomePublisher>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        gateway: Arc<dyn ChainRpc>,
        oracle: Arc<dyn GasOracle>,
        simulator: Arc<Simulator>,
        builder: Arc<TxBuilder>,
        mev: Arc<MevCoordinator>,
        publisher: Arc<dyn crate::publisher::OutcomePublisher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            gateway,
            oracle,
            simulator,
            builder,
            mev,
            publisher,
            config,
        }
    }

    /// Run one opportunity to its terminal publish. Infallible: every branch
    /// ends in exactly one result record.
    pub async fn execute(&self, opportunity: Opportunity) -> ExecutionResult {
        let received_ns = now_ns();
        info!(
            "⚡ Executing opportunity {} on {} ({:?}, expected ${})",
            opportunity.id,
            opportunity.chain_name,
            opportunity.strategy,
            opportunity.expected_profit
        );

        let mut run = PipelineRun::new(&opportunity, received_ns);
        self.emit_status(&run.record.opportunity_id, StatusTag::Received, None)
            .await;

        if let Err(fault) = self.drive(&opportunity, &mut run).await {
            warn!("❌ Run {} faulted: {}", opportunity.id, fault);
            run.record.success = false;
            run.record.reason = Some(fault.to_string());
            run.set_state(RunState::Failed);
        }

        self.publish_terminal(&run).await;
        run.record
    }

    /// The state machine proper. `Ok` covers success and policy rejection;
    /// `Err` is a fault the caller folds into a failure record.
    async fn drive(
        &self,
        opportunity: &Opportunity,
        run: &mut PipelineRun,
    ) -> Result<(), RunFault> {
        if self.gateway.chain_id(&opportunity.chain_name).is_none() {
            run.reject(format!("unknown chain: {}", opportunity.chain_name));
            return Ok(());
        }
        if deadline_expired(opportunity) {
            run.reject("deadline exceeded");
            return Ok(());
        }

        // Price gas.
        run.set_state(RunState::Bidding);
        let bid = self.oracle.get_bid(opportunity).await?;
        run.record.gas_price_gwei = Some(bid.gas_price_gwei);
        run.record.gas_limit = Some(bid.gas_limit);
        run.record.gas_cost_usd = Some(bid.estimated_cost_usd);
        if let Some(cap) = opportunity.max_gas_price_gwei {
            if bid.gas_price_gwei > cap {
                run.reject(format!(
                    "gas price {} gwei exceeds cap {} gwei",
                    bid.gas_price_gwei, cap
                ));
                return Ok(());
            }
        }

        let params = match opportunity.strategy_params() {
            Ok(params) => params,
            Err(invalid) => {
                run.reject(invalid.to_string());
                return Ok(());
            }
        };

        // Simulate.
        run.set_state(RunState::Simulating);
        self.emit_status(&opportunity.id, StatusTag::Simulating, None)
            .await;
        run.record.sim_started_ns = Some(now_ns());
        let simulation = self.simulator.simulate(opportunity, &params, &bid).await;
        run.record.sim_completed_ns = Some(now_ns());

        let outcome = match simulation {
            Ok(outcome) => outcome,
            Err(SimulatorError::MissingBinding(chain)) => {
                run.reject(format!("no contract binding for chain {chain}"));
                return Ok(());
            }
            Err(fault) => return Err(fault.into()),
        };
        run.record.flash_loan_fee_usd = Some(outcome.cost_breakdown.flash_loan_fee_usd);
        run.record.estimated_profit_usd = Some(outcome.estimated_net_profit_usd);

        if let Some(revert) = &outcome.revert_reason {
            run.reject(format!("simulation reverted: {revert}"));
            return Ok(());
        }
        if !outcome.feasible {
            run.reject(format!(
                "unprofitable after costs: net ${}",
                outcome.estimated_net_profit_usd
            ));
            return Ok(());
        }

        // Build and sign. The encoder is shared with the simulator, so the
        // submitted call-data matches the simulated call-data.
        let signed_hex = self.builder.build_and_sign(opportunity, &params, &bid).await?;

        // Deadline is re-checked at the submission edge.
        if deadline_expired(opportunity) {
            run.reject("deadline exceeded");
            return Ok(());
        }

        if opportunity.use_mev && self.mev.available(&opportunity.chain_name) {
            self.submit_mev(opportunity, run, &signed_hex).await
        } else {
            self.submit_standard(opportunity, run, &signed_hex).await
        }
    }

    /// Standard branch: raw submission plus receipt polling.
    async fn submit_standard(
        &self,
        opportunity: &Opportunity,
        run: &mut PipelineRun,
        signed_hex: &str,
    ) -> Result<(), RunFault> {
        run.set_state(RunState::SubmittingStandard);
        self.emit_status(&opportunity.id, StatusTag::Submitting, None)
            .await;

        let tx_hash = self
            .gateway
            .send_raw_transaction(&opportunity.chain_name, signed_hex)
            .await?;
        run.record.submitted_ns = Some(now_ns());
        run.record.transaction_hash = Some(tx_hash.clone());

        run.set_state(RunState::Pending);
        self.emit_status(&opportunity.id, StatusTag::Pending, None)
            .await;

        for attempt in 1..=self.config.receipt_poll_attempts {
            tokio::time::sleep(self.config.receipt_poll_interval).await;
            match self.gateway.receipt(&opportunity.chain_name, &tx_hash).await {
                Ok(Some(receipt)) if receipt.status => {
                    run.record.success = true;
                    run.record.block_number = receipt.block_number;
                    run.record.confirmed_ns = Some(now_ns());
                    run.set_state(RunState::Confirmed);
                    info!(
                        "💰 Confirmed {} in block {} ({} gas used)",
                        opportunity.id,
                        receipt.block_number.unwrap_or_default(),
                        receipt.gas_used.unwrap_or_default()
                    );
                    return Ok(());
                }
                Ok(Some(receipt)) => {
                    run.record.block_number = receipt.block_number;
                    run.record.reason = Some("transaction reverted on-chain".to_string());
                    run.set_state(RunState::Failed);
                    return Ok(());
                }
                Ok(None) => {}
                // Poll errors are absorbed within the attempt budget.
                Err(e) => debug!("Receipt poll attempt {} failed: {}", attempt, e),
            }
        }

        // The transaction may still land; this executor neither retries nor
        // cancels.
        run.record.reason = Some(format!(
            "receipt timeout after {} attempts",
            self.config.receipt_poll_attempts
        ));
        run.set_state(RunState::TimedOut);
        Ok(())
    }

    /// MEV branch: bundle submission plus inclusion wait.
    async fn submit_mev(
        &self,
        opportunity: &Opportunity,
        run: &mut PipelineRun,
        signed_hex: &str,
    ) -> Result<(), RunFault> {
        run.set_state(RunState::SubmittingMev);
        self.emit_status(&opportunity.id, StatusTag::SubmittingMev, None)
            .await;

        let submission = match self.mev.submit(opportunity, signed_hex).await {
            Ok(submission) => submission,
            Err(rejected) => {
                run.record.mev_provider = Some(crate::mev::select_provider(opportunity));
                run.record.success = false;
                run.record.reason = Some(rejected.to_string());
                run.set_state(RunState::Failed);
                return Ok(());
            }
        };
        run.record.submitted_ns = Some(submission.submitted_ns);
        run.record.mev_provider = Some(submission.provider);
        run.record.bundle_id = Some(submission.bundle_id.clone());
        run.record.tip_lamports = submission.tip_lamports;

        run.set_state(RunState::Pending);
        self.emit_status(&opportunity.id, StatusTag::Pending, None)
            .await;

        let outcome = self
            .mev
            .await_inclusion(opportunity, &submission, opportunity.deadline_ns())
            .await;
        if outcome.landed {
            run.record.success = true;
            run.record.block_number = outcome.block_number;
            run.record.confirmed_ns = Some(outcome.resolved_ns);
            run.set_state(RunState::Confirmed);
            info!(
                "💰 Bundle {} landed for {} (block {:?})",
                outcome.bundle_id, opportunity.id, outcome.block_number
            );
        } else {
            run.record.reason = outcome.reason.clone();
            let timed_out = outcome.reason.as_deref() == Some("Confirmation timeout");
            run.set_state(if timed_out {
                RunState::TimedOut
            } else {
                RunState::Failed
            });
        }
        run.mev = Some(outcome);
        Ok(())
    }

    /// Final result, bundle outcome, learning projection, then the terminal
    /// status. Delivery degradation is logged and absorbed.
    async fn publish_terminal(&self, run: &PipelineRun) {
        let record = &run.record;
        if let Err(e) = self.publisher.publish_result(record).await {
            warn!(
                "⚠️ Result publish degraded for {}: {}",
                record.opportunity_id, e
            );
        }

        if let Some(mev) = &run.mev {
            let outcome = BundleOutcome {
                bundle_id: mev.bundle_id.clone(),
                provider: mev.provider,
                chain_name: record.chain_name.clone(),
                opportunity_id: record.opportunity_id.clone(),
                landed: mev.landed,
                block_number: mev.block_number,
                tip_lamports: mev.tip_lamports,
                submitted_ns: mev.submitted_ns,
                resolved_ns: mev.resolved_ns,
                reason: mev.reason.clone(),
            };
            if let Err(e) = self.publisher.publish_bundle_outcome(&outcome).await {
                warn!(
                    "⚠️ Bundle outcome publish degraded for {}: {}",
                    record.opportunity_id, e
                );
            }
        }

        if let Err(e) = self.publisher.publish_learning(&record.learning_record()).await {
            debug!(
                "Learning feed publish degraded for {}: {}",
                record.opportunity_id, e
            );
        }

        let terminal = if record.success {
            StatusTag::Confirmed
        } else {
            StatusTag::Failed
        };
        self.emit_status(&record.opportunity_id, terminal, record.reason.clone())
            .await;
    }

    /// Best-effort status emission; degradation never disturbs the run.
    async fn emit_status(&self, opportunity_id: &str, status: StatusTag, detail: Option<String>) {
        let update = StatusUpdate {
            opportunity_id: opportunity_id.to_string(),
            status,
            timestamp_ns: now_ns(),
            detail,
        };
        if let Err(e) = self.publisher.publish_status(&update).await {
            debug!(
                "Status publish degraded for {} ({:?}): {}",
                opportunity_id, status, e
            );
        }
    }
}

/// Whether the opportunity's absolute deadline has passed.
fn deadline_expired(opportunity: &Opportunity) -> bool {
    opportunity
        .deadline_ns()
        .is_some_and(|deadline| deadline <= now_ns())
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ci;

    #[test]
    fn test_deadline_expired() {
        let mut opp: Opportunity = ci::from_str(
            r#"{"id": "d", "chain": "ethereum", "asset": "0xA", "amount": 1,
                "strategy": "CrossDex", "sourceDex": "0xS", "targetDex": "0xT"}"#,
        )
        .unwrap();

        assert!(!deadline_expired(&opp));
        opp.expires_at_nanos = Some(1);
        assert!(deadline_expired(&opp));
        opp.expires_at_nanos = Some(now_ns() + 60_000_000_000);
        assert!(!deadline_expired(&opp));
    }
}
