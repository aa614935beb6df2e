//! Momentum task service.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                      MOMENTUM                         │
//!   Client Request   │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!   ─────────────────┼─▶│  http   │───▶│  auth   │───▶│ tasks/users  │      │
//!                    │  │ server  │    │  (JWT)  │    │   services   │      │
//!                    │  └─────────┘    └─────────┘    └──────┬───────┘      │
//!                    │                                       │              │
//!                    │           ┌──────────┐         ┌──────▼───────┐      │
//!                    │           │    ai    │         │ verification │      │
//!                    │           │ advisor  │         │  + rewards   │      │
//!                    │           └──────────┘         └──────┬───────┘      │
//!                    │                                       │              │
//!                    │  ┌─────────┐                   ┌──────▼───────┐      │
//!                    │  │ storage │◀──── reconciler ──│  blockchain  │──────┼──▶ EVM RPC
//!                    │  └─────────┘                   │   ledger     │      │
//!                    │                                └──────────────┘      │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use momentum::config::load_config;
use momentum::http::HttpServer;
use momentum::lifecycle::{assemble, shutdown_on_signal, Services, Shutdown};
use momentum::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "momentum")]
#[command(about = "Task manager with on-chain completion proofs", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "MOMENTUM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logging starts at info so config loading can report; the configured
    // level takes over below unless RUST_LOG is set.
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => {
            logging::init(&config.observability.log_level);
            config
        }
        Err(e) => {
            logging::init("info");
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        blockchain = config.blockchain.enabled,
        chain_id = config.blockchain.chain_id,
        "momentum starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let services = Services::from_config(&config).await?;
    let app = assemble(&config, services);
    let store = app.state.store.clone();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let reconciler = tokio::spawn(app.reconciler.run(shutdown.subscribe()));
    let flusher = tokio::spawn(store.clone().run_flusher(
        Duration::from_millis(config.storage.flush_interval_ms),
        shutdown.subscribe(),
    ));
    tokio::spawn(shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(app.state);
    server.run(listener, shutdown.subscribe()).await?;

    // The server can also stop on its own; make sure background tasks follow.
    shutdown.trigger();
    if let Err(e) = reconciler.await {
        tracing::warn!(error = %e, "Reconciler task ended abnormally");
    }
    if let Err(e) = flusher.await {
        tracing::warn!(error = %e, "Snapshot flusher ended abnormally");
    }

    if let Err(e) = store.save() {
        tracing::error!(error = %e, "Failed to write final store snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
