//! Outbound bus subject construction.
//!
//! Subjects are derived from run attributes in exactly one place so the
//! executor and any downstream consumer agree on the sharding scheme.

use crate::opportunity::MevProvider;

/// Best-effort training feed consumed by the ML optimizer.
pub const LEARNING_FEED: &str = "mloptimizer.training.flashloan";

/// Durable final-result subject, sharded by chain.
pub fn result_subject(chain_name: &str) -> String {
    format!("flashloan.result.{}", chain_name.to_lowercase())
}

/// Ephemeral status subject, sharded by opportunity.
pub fn status_subject(opportunity_id: &str) -> String {
    format!("flashloan.status.{opportunity_id}")
}

/// Durable bundle-outcome subject, sharded by relay provider.
pub fn bundle_result_subject(provider: MevProvider) -> String {
    format!("mev.bundle.result.{provider}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_subject_lowercases_chain() {
        assert_eq!(result_subject("Ethereum"), "flashloan.result.ethereum");
        assert_eq!(result_subject("solana"), "flashloan.result.solana");
    }

    #[test]
    fn test_bundle_subject_per_provider() {
        assert_eq!(
            bundle_result_subject(MevProvider::Jito),
            "mev.bundle.result.jito"
        );
        assert_eq!(
            bundle_result_subject(MevProvider::Suave),
            "mev.bundle.result.suave"
        );
    }

    #[test]
    fn test_status_subject_embeds_opportunity() {
        assert_eq!(status_subject("op-9"), "flashloan.status.op-9");
    }
}
