//! # MEV Coordinator - Bundle Routing, Tip Sizing, Inclusion Wait
//!
//! ## Purpose
//!
//! Routes MEV-flagged opportunities to the right bundle relay, sizes the
//! Solana tip from the relay's estimate (scaled by the opportunity's AOI
//! score and clamped to its ceiling), submits the bundle, and polls the
//! provider-specific status endpoint until a terminal status or deadline.
//!
//! ## Provider Selection
//!
//! An explicit `preferredMevProvider` always wins. Otherwise the chain map
//! decides: solana → jito; the known EVM chains (ethereum, polygon, arbitrum,
//! base, optimism, avalanche, bsc) and anything unknown → suave.
//!
//! ## Inclusion Semantics
//!
//! A timeout is NOT an on-chain failure: the bundle may still land. The
//! outcome records the ambiguity as `Confirmation timeout` with the bundle id
//! preserved. `was_frontrun`/`was_backrun` attribution is reserved for a
//! downstream analyzer and never computed here.

pub mod flashbots;
pub mod jito;

pub use flashbots::{EvmBundle, EvmBundleRelay, EvmBundleStats, FlashbotsClient};
pub use jito::{JitoClient, SolanaBundleRelay, SolanaBundleStatus, TipEstimate};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::chain::ChainRpc;
use crate::now_ns;
use types::{MevProvider, Opportunity};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no bundle endpoint configured for chain {0}")]
    NoEndpoint(String),
    #[error("relay transport failure: {0}")]
    Transport(String),
    #[error("relay returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("relay RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("relay response malformed: {0}")]
    Malformed(String),
}

/// Poll cadences and inclusion deadlines, overridable so tests can compress
/// wall-clock time.
#[derive(Debug, Clone)]
pub struct MevTiming {
    pub evm_poll_interval: Duration,
    pub evm_inclusion_deadline: Duration,
    pub solana_poll_interval: Duration,
    pub solana_inclusion_deadline: Duration,
}

impl Default for MevTiming {
    fn default() -> Self {
        Self {
            evm_poll_interval: Duration::from_millis(1000),
            evm_inclusion_deadline: Duration::from_secs(60),
            solana_poll_interval: Duration::from_millis(500),
            solana_inclusion_deadline: Duration::from_secs(30),
        }
    }
}

/// An accepted bundle submission, awaiting inclusion.
#[derive(Debug, Clone)]
pub struct MevSubmission {
    pub provider: MevProvider,
    pub bundle_id: String,
    pub tip_lamports: Option<u64>,
    /// EVM path: the block the bundle targets (drives the stats poll).
    pub target_block: Option<u64>,
    pub submitted_ns: u64,
}

/// Terminal outcome of one bundle submission.
#[derive(Debug, Clone)]
pub struct MevOutcome {
    pub provider: MevProvider,
    pub bundle_id: String,
    pub tip_lamports: Option<u64>,
    pub landed: bool,
    pub block_number: Option<u64>,
    pub reason: Option<String>,
    pub submitted_ns: u64,
    pub resolved_ns: u64,
}

/// Chain-map default when no provider preference is set.
pub fn default_provider_for_chain(chain: &str) -> MevProvider {
    match chain.to_lowercase().as_str() {
        "solana" => MevProvider::Jito,
        "ethereum" | "polygon" | "arbitrum" | "base" | "optimism" | "avalanche" | "bsc" => {
            MevProvider::Suave
        }
        _ => MevProvider::Suave,
    }
}

/// Explicit preference wins; chain map otherwise.
pub fn select_provider(opportunity: &Opportunity) -> MevProvider {
    opportunity
        .preferred_mev_provider
        .unwrap_or_else(|| default_provider_for_chain(&opportunity.chain_name))
}

pub struct MevCoordinator {
    evm: Arc<dyn EvmBundleRelay>,
    solana: Arc<dyn SolanaBundleRelay>,
    gateway: Arc<dyn ChainRpc>,
    jito_enabled: bool,
    timing: MevTiming,
}

impl MevCoordinator {
    pub fn new(
        evm: Arc<dyn EvmBundleRelay>,
        solana: Arc<dyn SolanaBundleRelay>,
        gateway: Arc<dyn ChainRpc>,
        jito_enabled: bool,
        timing: MevTiming,
    ) -> Self {
        Self {
            evm,
            solana,
            gateway,
            jito_enabled,
            timing,
        }
    }

    /// Whether MEV routing is possible on `chain` at all.
    pub fn available(&self, chain: &str) -> bool {
        (self.jito_enabled && chain.eq_ignore_ascii_case("solana"))
            || self.evm.supports_chain(chain)
    }

    /// Size the Solana tip: relay recommendation scaled by `0.5 + 0.5 * aoi`
    /// (0.75 when absent), clamped to `[estimate.min, maxMevTip ?? expected
    /// profit / 10]` with SOL ceilings scaled to lamports.
    pub fn size_tip(estimate: &TipEstimate, opportunity: &Opportunity) -> u64 {
        let multiplier = opportunity
            .aoi_score
            .map(|aoi| dec!(0.5) + dec!(0.5) * aoi)
            .unwrap_or(dec!(0.75));
        let scaled = (Decimal::from(estimate.recommended) * multiplier)
            .floor()
            .to_u64()
            .unwrap_or(estimate.recommended);

        let ceiling_sol = opportunity
            .max_mev_tip
            .unwrap_or_else(|| opportunity.expected_profit / dec!(10));
        let ceiling = crate::encoding::sol_to_lamports(ceiling_sol).unwrap_or(u64::MAX);

        // The relay floor wins over a ceiling below it; bids under the floor
        // are discarded relay-side anyway.
        scaled.clamp(estimate.min, ceiling.max(estimate.min))
    }

    /// Submit the signed transaction as a bundle through the selected
    /// provider. Relay rejections surface as errors; acceptance returns the
    /// recorded submission.
    pub async fn submit(
        &self,
        opportunity: &Opportunity,
        signed_hex: &str,
    ) -> Result<MevSubmission, RelayError> {
        match select_provider(opportunity) {
            MevProvider::Jito => self.submit_solana(opportunity, signed_hex).await,
            MevProvider::Suave => self.submit_evm(opportunity, signed_hex).await,
        }
    }

    async fn submit_solana(
        &self,
        opportunity: &Opportunity,
        signed_hex: &str,
    ) -> Result<MevSubmission, RelayError> {
        match self.solana.tip_accounts().await {
            Ok(accounts) => debug!(
                "Tip account for {}: {}",
                opportunity.id,
                accounts.first().map(String::as_str).unwrap_or("none")
            ),
            Err(e) => debug!("Tip account lookup failed: {}", e),
        }

        let estimate = self.solana.tip_estimate().await?;
        let tip = Self::size_tip(&estimate, opportunity);
        let transaction = jito::encode_transaction_base64(signed_hex)?;
        let bundle_id = self.solana.send_bundle(vec![transaction], tip).await?;
        debug!(
            "📦 Bundle {} submitted for {} (tip {} lamports)",
            bundle_id, opportunity.id, tip
        );

        Ok(MevSubmission {
            provider: MevProvider::Jito,
            bundle_id,
            tip_lamports: Some(tip),
            target_block: None,
            submitted_ns: now_ns(),
        })
    }

    async fn submit_evm(
        &self,
        opportunity: &Opportunity,
        signed_hex: &str,
    ) -> Result<MevSubmission, RelayError> {
        let chain = &opportunity.chain_name;
        let current_block = self
            .gateway
            .block_number(chain)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let target_block = current_block + 1;

        let bundle = EvmBundle::for_block(vec![signed_hex.to_string()], target_block);
        let bundle_id = self
            .evm
            .send_bundle(chain, &bundle)
            .await?
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        debug!(
            "📦 Bundle {} submitted for {} targeting block {}",
            bundle_id, opportunity.id, target_block
        );

        Ok(MevSubmission {
            provider: MevProvider::Suave,
            bundle_id,
            tip_lamports: None,
            target_block: Some(target_block),
            submitted_ns: now_ns(),
        })
    }

    /// Poll the provider status endpoint until a terminal status or deadline.
    /// Transient poll failures stay within the wait budget.
    pub async fn await_inclusion(
        &self,
        opportunity: &Opportunity,
        submission: &MevSubmission,
        deadline_ns: Option<u64>,
    ) -> MevOutcome {
        let (base_deadline, poll_interval) = match submission.provider {
            MevProvider::Jito => (
                self.timing.solana_inclusion_deadline,
                self.timing.solana_poll_interval,
            ),
            MevProvider::Suave => (
                self.timing.evm_inclusion_deadline,
                self.timing.evm_poll_interval,
            ),
        };
        let budget = self.wait_budget(base_deadline, deadline_ns);
        let started = tokio::time::Instant::now();

        while started.elapsed() < budget {
            tokio::time::sleep(poll_interval).await;
            match self.poll_once(opportunity, submission).await {
                Ok(Some((landed, block_number, reason))) => {
                    return self.outcome(submission, landed, block_number, reason)
                }
                Ok(None) => {}
                Err(e) => debug!(
                    "Status poll for bundle {} failed: {}",
                    submission.bundle_id, e
                ),
            }
        }

        // Unacknowledged, not failed: the bundle may still land.
        self.outcome(
            submission,
            false,
            None,
            Some("Confirmation timeout".to_string()),
        )
    }

    /// One status poll; `Some` when terminal.
    #[allow(clippy::type_complexity)]
    async fn poll_once(
        &self,
        opportunity: &Opportunity,
        submission: &MevSubmission,
    ) -> Result<Option<(bool, Option<u64>, Option<String>)>, RelayError> {
        match submission.provider {
            MevProvider::Jito => match self.solana.bundle_status(&submission.bundle_id).await? {
                SolanaBundleStatus::Landed { slot } => Ok(Some((true, Some(slot), None))),
                SolanaBundleStatus::Failed { reason } => Ok(Some((false, None, Some(reason)))),
                SolanaBundleStatus::Pending => Ok(None),
            },
            MevProvider::Suave => {
                let block_hex = submission
                    .target_block
                    .map(|block| format!("{block:#x}"))
                    .unwrap_or_default();
                let stats = self
                    .evm
                    .bundle_stats(&opportunity.chain_name, &submission.bundle_id, &block_hex)
                    .await?;
                if stats.landed() {
                    Ok(Some((
                        true,
                        stats.block_number.or(submission.target_block),
                        None,
                    )))
                } else if stats.failed() {
                    Ok(Some((false, None, Some("bundle failed".to_string()))))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn outcome(
        &self,
        submission: &MevSubmission,
        landed: bool,
        block_number: Option<u64>,
        reason: Option<String>,
    ) -> MevOutcome {
        MevOutcome {
            provider: submission.provider,
            bundle_id: submission.bundle_id.clone(),
            tip_lamports: submission.tip_lamports,
            landed,
            block_number,
            reason,
            submitted_ns: submission.submitted_ns,
            resolved_ns: now_ns(),
        }
    }

    /// Remaining wait once the opportunity deadline is applied.
    fn wait_budget(&self, base: Duration, deadline_ns: Option<u64>) -> Duration {
        match deadline_ns {
            Some(deadline) => {
                let now = now_ns();
                if deadline <= now {
                    Duration::ZERO
                } else {
                    base.min(Duration::from_nanos(deadline - now))
                }
            }
            None => base,
        }
    }
}
