//! # Flashloan Executor - Opportunity Execution Service
//!
//! ## Purpose
//!
//! Stateless, event-driven execution engine for flash-loan arbitrage
//! opportunities. Consumes opportunities from the bus, prices gas through the
//! ML bidding oracle, gates every submission behind a read-only on-chain
//! simulation, signs and submits either to the public mempool or through an
//! MEV bundle relay, waits for inclusion, and publishes one durable result
//! record per opportunity for the downstream learning system.
//!
//! ## Architecture Role
//!
//! ```text
//! Bus Subscriber → [Opportunity Pipeline] → Gas Bidder → Simulator
//!        ↓                  ↓                                ↓
//! Opportunity JSON    Per-run state machine         Profit gating (net > 0)
//!        ↓                  ↓                                ↓
//! Result Publisher ← Inclusion wait ← MEV Coordinator / Chain Gateway
//! ```
//!
//! Every run is an independent tokio task with its own `PipelineRun` state;
//! shared collaborators (chain registry, contract bindings, signer, bus
//! connection) are immutable after startup.

pub mod bindings;
pub mod chain;
pub mod consumer;
pub mod encoding;
pub mod gas_bid;
pub mod logging;
pub mod mev;
pub mod pipeline;
pub mod publisher;
pub mod simulator;
pub mod tx_builder;

/// Current wall-clock time in Unix nanoseconds.
///
/// Pipeline timestamps only need per-run monotonicity; a clock fault degrades
/// to 0 rather than aborting a run mid-flight.
pub fn now_ns() -> u64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_nanos() as u64,
        Err(e) => {
            tracing::error!("System clock before Unix epoch: {}", e);
            0
        }
    }
}
