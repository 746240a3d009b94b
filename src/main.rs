//! swapd - custodial ADA/ETH swap service
//!
//! Watches custody addresses on Cardano PreProd and Ethereum Sepolia for
//! user deposits and settles each matched order with an outbound payment of
//! the opposite asset, at most once per order.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

mod api;
mod chain;
mod config;
mod coordination;
mod error;
mod metrics;
mod order;
mod settle;
mod store;

use chain::{BlockfrostObserver, ChainObserver, EtherscanObserver};
use config::Settings;
use coordination::{CoordinatorConfig, SwapCoordinator};
use metrics::MetricsServer;
use order::Network;
use settle::{AdaSender, EthSender, SettlementSender};
use store::{OrderStore, PgOrderStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting swapd v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Arc::new(Settings::load()?);

    // Initialize database connection
    let pg_store = Arc::new(PgOrderStore::new(&settings.database).await?);
    info!("Database connection established");

    // Run migrations
    pg_store.run_migrations().await?;

    let store: Arc<dyn OrderStore> = pg_store.clone();
    let call_timeout = Duration::from_secs(settings.service.external_call_timeout_secs);

    // Deposit observers, one per network with a configured indexer
    let mut observers: HashMap<Network, Arc<dyn ChainObserver>> = HashMap::new();
    if settings.eth.etherscan_api_key.is_empty() {
        warn!("No Etherscan API key - ETH deposits will not be detected");
    } else {
        observers.insert(
            Network::Ethereum,
            Arc::new(EtherscanObserver::new(&settings.eth, call_timeout)?),
        );
    }
    if settings.ada.blockfrost_api_key.is_empty() {
        warn!("No Blockfrost API key - ADA deposits will not be detected");
    } else {
        observers.insert(
            Network::Cardano,
            Arc::new(BlockfrostObserver::new(&settings.ada, call_timeout)?),
        );
    }

    // Settlement senders; a network without signing capability stays absent
    // and its orders park at `deposited`
    let mut senders: HashMap<Network, Arc<dyn SettlementSender>> = HashMap::new();
    if let Some(eth_sender) = EthSender::from_config(&settings.eth)? {
        senders.insert(eth_sender.network(), Arc::new(eth_sender));
    }
    if let Some(ada_sender) = AdaSender::from_config(&settings.ada, call_timeout)? {
        senders.insert(ada_sender.network(), Arc::new(ada_sender));
    }
    info!(
        "Observers: {:?}, senders: {:?}",
        observers.keys().collect::<Vec<_>>(),
        senders.keys().collect::<Vec<_>>()
    );

    // Initialize metrics server
    let metrics_server = settings
        .metrics
        .enabled
        .then(|| MetricsServer::new(settings.metrics.port));

    // Initialize coordinator
    let coordinator = Arc::new(SwapCoordinator::new(
        store.clone(),
        observers,
        senders,
        CoordinatorConfig::from_settings(&settings),
    ));

    // Start API server
    let api_handle = tokio::spawn({
        let config = settings.api.clone();
        let store = store.clone();
        let settings = settings.clone();
        async move {
            if let Err(e) = api::run_server(config, store, settings).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start coordinator
    let coordinator_handle = tokio::spawn({
        let coordinator = coordinator.clone();
        async move {
            if let Err(e) = coordinator.run().await {
                error!("Coordinator error: {}", e);
            }
        }
    });

    // Database health loop
    let health_handle = tokio::spawn({
        let pg_store = pg_store.clone();
        async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                if let Err(e) = pg_store.health_check().await {
                    warn!("Database health check failed: {}", e);
                }
            }
        }
    });

    info!("swapd is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Graceful shutdown
    coordinator.stop().await;

    // Abort background tasks
    api_handle.abort();
    coordinator_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("swapd stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swapd=debug,sqlx=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
