//! Proof Service
//!
//! REST API serving validator and withdrawal proofs for on-chain verifiers.

mod abi;
mod api;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use proof_gen::{BeaconClient, ChainSpec, ProofOrchestrator, StateProver};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "proof-service")]
#[command(about = "Validator and withdrawal proof API for beacon-chain verifiers")]
struct Args {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// Chain id of the network the beacon node follows
    #[arg(long, env = "CHAIN_ID", default_value_t = 1)]
    chain_id: u64,

    /// Capella fork slot, required for chain ids without built-in parameters
    #[arg(long, env = "CAPELLA_FORK_SLOT")]
    capella_fork_slot: Option<u64>,

    /// API listen address
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Metrics listen address
    #[arg(long, env = "METRICS_LISTEN", default_value = "0.0.0.0:9090")]
    metrics_listen: String,

    /// Per-request deadline in seconds (0 disables it)
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    request_timeout_secs: u64,
}

fn chain_spec(args: &Args) -> Result<ChainSpec> {
    Ok(ChainSpec::resolve(args.chain_id, args.capella_fork_slot)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let chain = chain_spec(&args)?;

    tracing::info!("Starting proof service");
    tracing::info!(%chain, capella_fork_slot = chain.capella_fork_slot, "Network");
    tracing::info!(beacon_url = %args.beacon_url, "Beacon node");
    tracing::info!(listen = %args.listen, "API server");

    let metrics_addr: SocketAddr = args
        .metrics_listen
        .parse()
        .context("Invalid metrics listen address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(address = %metrics_addr, "Metrics exporter listening");

    let mut orchestrator = ProofOrchestrator::new(
        Arc::new(BeaconClient::new(args.beacon_url.clone())),
        Arc::new(StateProver::new(chain)),
    );
    if args.request_timeout_secs > 0 {
        orchestrator = orchestrator.with_timeout(Duration::from_secs(args.request_timeout_secs));
    }
    let app_state = state::AppState::new(orchestrator, chain);

    // Start API server
    let api_handle = tokio::spawn(api::run_server(args.listen.clone(), app_state));

    // Wait for shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
                Err(e) => tracing::error!(error = %e, "API server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    Ok(())
}
