//! # Result Publisher - Outcome Emission onto the Bus
//!
//! ## Purpose
//!
//! Owns the executor's single long-lived bus connection and the three
//! publishing lanes: durable final results (JetStream when enabled), durable
//! bundle outcomes, and best-effort status/learning publishes. The client
//! reconnects forever with a 2 s delay; when the connection is down at
//! publish time the payload is dropped and the caller logs the degradation -
//! outbound durability while the bus is unavailable is explicitly not this
//! service's job.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use config::NatsConfig;
use types::{subjects, BundleOutcome, ExecutionResult, LearningRecord, StatusUpdate};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("bus connection is not established")]
    Disconnected,
    #[error("bus publish failed: {0}")]
    Bus(String),
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Publishing seam used by the pipeline.
#[async_trait]
pub trait OutcomePublisher: Send + Sync {
    /// Durable lane: `flashloan.result.<chain>`.
    async fn publish_result(&self, result: &ExecutionResult) -> Result<(), PublishError>;

    /// Best-effort lane: `flashloan.status.<opportunity_id>`.
    async fn publish_status(&self, update: &StatusUpdate) -> Result<(), PublishError>;

    /// Durable lane: `mev.bundle.result.<provider>`.
    async fn publish_bundle_outcome(&self, outcome: &BundleOutcome) -> Result<(), PublishError>;

    /// Best-effort lane: `mloptimizer.training.flashloan`.
    async fn publish_learning(&self, record: &LearningRecord) -> Result<(), PublishError>;
}

/// Production publisher over a NATS client.
pub struct NatsPublisher {
    client: async_nats::Client,
    jetstream: Option<async_nats::jetstream::Context>,
}

impl NatsPublisher {
    /// Establish the long-lived connection. Initial connect retries; later
    /// drops are retried forever with [`RECONNECT_DELAY`] between attempts.
    pub async fn connect(config: &NatsConfig) -> anyhow::Result<Self> {
        let mut options = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .reconnect_delay_callback(|_attempts| RECONNECT_DELAY);
        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            options = options.user_and_password(user.clone(), password.clone());
        }
        if config.use_tls {
            options = options.require_tls(true);
        }

        let client = options.connect(config.url.clone()).await?;
        let jetstream = config
            .use_jet_stream
            .then(|| async_nats::jetstream::new(client.clone()));
        info!(
            "🌐 Bus connection established to {} (JetStream: {})",
            config.url,
            jetstream.is_some()
        );
        Ok(Self { client, jetstream })
    }

    /// Handle for the subscriber side; one connection serves both directions.
    pub fn client(&self) -> async_nats::Client {
        self.client.clone()
    }

    fn ensure_connected(&self) -> Result<(), PublishError> {
        match self.client.connection_state() {
            async_nats::connection::State::Connected => Ok(()),
            _ => Err(PublishError::Disconnected),
        }
    }

    async fn publish_core<T: Serialize>(
        &self,
        subject: String,
        payload: &T,
    ) -> Result<(), PublishError> {
        self.ensure_connected()?;
        let bytes = serde_json::to_vec(payload)?;
        self.client
            .publish(subject, bytes.into())
            .await
            .map_err(|e| PublishError::Bus(e.to_string()))
    }

    async fn publish_durable<T: Serialize>(
        &self,
        subject: String,
        payload: &T,
    ) -> Result<(), PublishError> {
        let Some(jetstream) = &self.jetstream else {
            return self.publish_core(subject, payload).await;
        };
        self.ensure_connected()?;
        let bytes = serde_json::to_vec(payload)?;
        jetstream
            .publish(subject, bytes.into())
            .await
            .map_err(|e| PublishError::Bus(e.to_string()))?
            .await
            .map_err(|e| PublishError::Bus(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl OutcomePublisher for NatsPublisher {
    async fn publish_result(&self, result: &ExecutionResult) -> Result<(), PublishError> {
        let subject = subjects::result_subject(&result.chain_name);
        self.publish_durable(subject.clone(), result).await?;
        debug!(
            "📤 Published result for {} on {} (success: {})",
            result.opportunity_id, subject, result.success
        );
        Ok(())
    }

    async fn publish_status(&self, update: &StatusUpdate) -> Result<(), PublishError> {
        self.publish_core(subjects::status_subject(&update.opportunity_id), update)
            .await
    }

    async fn publish_bundle_outcome(&self, outcome: &BundleOutcome) -> Result<(), PublishError> {
        self.publish_durable(subjects::bundle_result_subject(outcome.provider), outcome)
            .await
    }

    async fn publish_learning(&self, record: &LearningRecord) -> Result<(), PublishError> {
        self.publish_core(subjects::LEARNING_FEED.to_string(), record)
            .await
    }
}
