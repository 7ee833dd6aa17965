//! # Bus Subscriber - Inbound Opportunity Consumption
//!
//! ## Purpose
//!
//! Long-lived subscription on the configured opportunity subject. Each valid
//! message becomes a fresh pipeline run on its own tokio task; undecodable
//! messages are logged and dropped. Concurrency is bounded by a semaphore -
//! when the cap is reached the consumer loop waits for a permit, so excess
//! messages queue in the bus rather than in process memory. Every spawned run
//! has a join owner: outcomes (and panics) are reaped and logged, never
//! fire-and-forget.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::pipeline::Pipeline;
use types::{ci, ExecutionResult, Opportunity};

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Maximum concurrent pipeline runs.
    pub max_concurrent_runs: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 64,
        }
    }
}

pub struct OpportunityConsumer {
    client: async_nats::Client,
    subject: String,
    pipeline: Arc<Pipeline>,
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
}

impl OpportunityConsumer {
    pub fn new(
        client: async_nats::Client,
        subject: String,
        pipeline: Arc<Pipeline>,
        config: ConsumerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            subject,
            pipeline,
            config,
            shutdown,
        }
    }

    /// Consume until shutdown or subscription loss, then drain in-flight
    /// runs so every terminal publish completes.
    pub async fn run(mut self) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_runs));
        let mut subscriber = self
            .client
            .subscribe(self.subject.clone())
            .await
            .context("opportunity subject subscription failed")?;
        info!(
            "📡 Subscribed to {} (max {} concurrent runs)",
            self.subject, self.config.max_concurrent_runs
        );

        let mut runs: JoinSet<ExecutionResult> = JoinSet::new();
        let mut processed: u64 = 0;
        let mut dropped: u64 = 0;

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!("🛑 Shutdown requested, stopping subscription");
                        break;
                    }
                }
                message = subscriber.next() => {
                    let Some(message) = message else {
                        warn!("⚠️ Bus subscription closed");
                        break;
                    };
                    match ci::from_slice::<Opportunity>(&message.payload) {
                        Err(e) => {
                            dropped += 1;
                            warn!("Dropping undecodable opportunity ({} dropped so far): {}", dropped, e);
                        }
                        Ok(opportunity) => {
                            if semaphore.available_permits() == 0 {
                                debug!("Run cap reached, backpressuring the subscription");
                            }
                            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                break;
                            };
                            processed += 1;
                            let pipeline = self.pipeline.clone();
                            runs.spawn(async move {
                                let _permit = permit;
                                pipeline.execute(opportunity).await
                            });
                        }
                    }
                }
                Some(finished) = runs.join_next(), if !runs.is_empty() => {
                    log_run_outcome(finished);
                }
            }
        }

        if !runs.is_empty() {
            info!("Draining {} in-flight runs", runs.len());
        }
        while let Some(finished) = runs.join_next().await {
            log_run_outcome(finished);
        }
        info!(
            "📊 Consumer stopped: {} runs started, {} messages dropped",
            processed, dropped
        );
        Ok(())
    }
}

fn log_run_outcome(finished: Result<ExecutionResult, tokio::task::JoinError>) {
    match finished {
        Ok(result) if result.success => crate::log_success!(
            "Run {} confirmed ({})",
            result.opportunity_id,
            result
                .transaction_hash
                .or(result.bundle_id)
                .unwrap_or_else(|| "no artifact".to_string())
        ),
        Ok(result) => info!(
            "Run {} ended without execution: {}",
            result.opportunity_id,
            result.reason.as_deref().unwrap_or("failed")
        ),
        Err(join_error) => error!("Run task did not complete: {}", join_error),
    }
}
