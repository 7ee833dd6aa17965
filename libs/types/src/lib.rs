//! # Flashloan Executor Types - Shared Message Model
//!
//! ## Purpose
//!
//! Canonical definitions for every message that crosses the executor's bus
//! boundary: inbound arbitrage opportunities, outbound execution results,
//! status updates, MEV bundle outcomes, and the flattened learning-feed
//! projection. All financial values use `rust_decimal::Decimal`; floats are
//! reserved for advisory feature fields that never feed a financial decision.
//!
//! ## Integration Points
//!
//! - **Input Sources**: Opportunity producers publishing JSON onto the bus
//! - **Output Destinations**: Result/status/learning subjects consumed by the
//!   learning system and dashboards
//! - **Ingestion**: Case-insensitive key handling lives in [`ci`], so message
//!   compatibility is a property of the serialization layer rather than of
//!   individual fields

pub mod ci;
pub mod opportunity;
pub mod result;
pub mod subjects;

pub use opportunity::{MevProvider, Opportunity, OpportunityError, StrategyKind, StrategyParams};
pub use result::{BundleOutcome, ExecutionResult, LearningRecord, StatusTag, StatusUpdate};
