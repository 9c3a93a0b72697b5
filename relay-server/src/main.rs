//! Bridge Relay
//!
//! Relays bridge events between the child chain (bor) and the consensus
//! chain (heimdall) through a message broker.

mod config;
mod context;
mod server;
mod shutdown;

use alloy::providers::ProviderBuilder;
use clap::Parser;
use config::{ConfigLoader, get_relayer_key};
use context::RelayContext;
use relay_core::queue::QueueConnector;
use relay_core::signer::RelayerSigner;
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long consumers get to finish in-flight messages on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Bridge Relay - event relay between bor and heimdall
#[derive(Parser, Debug)]
#[command(name = "bridge-relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./bridge-relay.toml")]
    config: PathBuf,

    /// Override the health listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Override the broker URL
    #[arg(long, env = "AMQP_URL")]
    amqp_url: Option<String>,

    /// Read the relayer key from this file instead of RELAYER_PRIVATE_KEY
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting bridge-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.listen, args.amqp_url.clone());
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let key = get_relayer_key(args.key_file.as_deref()).map_err(|e| {
        tracing::error!("Failed to read relayer key: {}", e);
        e
    })?;
    let signer = RelayerSigner::from_hex(&key).map_err(|e| {
        tracing::error!("Invalid relayer key: {}", e);
        e
    })?;
    tracing::info!("Relaying as {}", signer.address());

    if config.bor.chain_id.is_none() {
        tracing::warn!("bor.chain_id not set, child chain transactions are signed without replay protection");
    }

    let listen_addr = config.listen;
    let provider = ProviderBuilder::new().on_http(config.bor.rpc_url.clone());
    let context = RelayContext::new(config, signer, provider);

    // Connect to the broker
    tracing::info!("Connecting to broker...");
    let connector = Arc::new(
        QueueConnector::connect(&context.config.amqp_url, context.config.tasks.clone())
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to broker: {}", e);
                e
            })?,
    );
    tracing::info!("Broker connection established");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = connector
        .start(
            context.heimdall_consumer(),
            context.bor_consumer(),
            context.task_consumer(connector.clone()),
            shutdown_rx,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to start consumers: {}", e);
            e
        })?;

    // Build the router
    let router = build_router(handles.status());

    // Run the server
    let result = run_server(router, listen_addr, shutdown_signal()).await;

    // Stop the consumers, then close the broker connection
    tracing::info!("Stopping consumers...");
    shutdown_tx.send_replace(true);
    if tokio::time::timeout(SHUTDOWN_GRACE, handles.join())
        .await
        .is_err()
    {
        tracing::warn!("Consumers did not stop within {:?}", SHUTDOWN_GRACE);
    }

    tracing::info!("Closing broker connection...");
    if let Err(e) = connector.stop().await {
        tracing::error!("Failed to close broker connection: {}", e);
    }
    tracing::info!("Relay shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lapin=warn,hyper=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
