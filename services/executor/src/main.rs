use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::ExecutorConfig;
use flashloan_executor::bindings::ContractRegistry;
use flashloan_executor::chain::{ChainGateway, ChainRpc};
use flashloan_executor::consumer::{ConsumerConfig, OpportunityConsumer};
use flashloan_executor::gas_bid::{GasOracle, MlGasBidder};
use flashloan_executor::mev::{
    EvmBundleRelay, FlashbotsClient, JitoClient, MevCoordinator, MevTiming, SolanaBundleRelay,
};
use flashloan_executor::pipeline::{Pipeline, PipelineConfig};
use flashloan_executor::publisher::NatsPublisher;
use flashloan_executor::simulator::Simulator;
use flashloan_executor::tx_builder::TxBuilder;
use flashloan_executor::{log_error, log_success};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting Flashloan Executor...");

    let config = ExecutorConfig::load().context("configuration rejected at startup")?;
    let private_key = config
        .executor_wallet
        .private_key
        .clone()
        .context("executorWallet.privateKey is required")?;

    // Shared read-only collaborators, wired once.
    let gateway: Arc<dyn ChainRpc> = Arc::new(ChainGateway::new(&config.nodes)?);
    let registry = Arc::new(ContractRegistry::from_config(&config.smart_contracts)?);
    let builder = Arc::new(TxBuilder::new(gateway.clone(), registry.clone(), &private_key)?);
    let simulator = Arc::new(Simulator::new(
        gateway.clone(),
        registry.clone(),
        builder.address(),
    ));
    let oracle: Arc<dyn GasOracle> = Arc::new(MlGasBidder::new(&config.ml_optimizer)?);

    let evm_relay: Arc<dyn EvmBundleRelay> = Arc::new(FlashbotsClient::new(
        config.suave.builder_urls.clone(),
        config.suave.auth_token.clone(),
    )?);
    let solana_relay: Arc<dyn SolanaBundleRelay> = Arc::new(JitoClient::new(&config.jito)?);
    let mev = Arc::new(MevCoordinator::new(
        evm_relay,
        solana_relay,
        gateway.clone(),
        config.jito.enabled,
        MevTiming::default(),
    ));
    log_success!("{} chains registered, MEV relays wired", config.nodes.len());

    let publisher = Arc::new(
        NatsPublisher::connect(&config.nats)
            .await
            .context("bus connection failed")?,
    );
    let bus_client = publisher.client();

    let pipeline = Arc::new(Pipeline::new(
        gateway,
        oracle,
        simulator,
        builder,
        mev,
        publisher,
        PipelineConfig::default(),
    ));

    // Cooperative shutdown: in-flight runs finish their terminal publish.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log_error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("🛑 Interrupt received, shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let consumer = OpportunityConsumer::new(
        bus_client,
        config.nats.opportunity_subject.clone(),
        pipeline,
        ConsumerConfig::default(),
        shutdown_rx,
    );

    log_success!("Flashloan Executor initialized");
    consumer.run().await.context("opportunity consumer failed")
}
