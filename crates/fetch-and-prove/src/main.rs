//! One-shot proof generation against a live beacon node.
//!
//! Runs either proof query once and writes the bundle as pretty JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proof_gen::{BeaconClient, ChainSpec, ProofOrchestrator, StateProver};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fetch-and-prove")]
#[command(about = "Fetch beacon data and write a validator or withdrawal proof bundle")]
struct Cli {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// Chain id of the network the beacon node follows
    #[arg(long, env = "CHAIN_ID", default_value_t = 1)]
    chain_id: u64,

    /// Capella fork slot, required for chain ids without built-in parameters
    #[arg(long, env = "CAPELLA_FORK_SLOT")]
    capella_fork_slot: Option<u64>,

    /// Output file (defaults to `<kind>_proof_<validator index>.json`)
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prove a validator record against the block header at `slot`
    Validator {
        #[arg(long)]
        slot: u64,
        #[arg(long)]
        validator_index: u64,
    },
    /// Prove a withdrawal at `withdrawal_slot`, anchored at `state_slot`
    Withdrawal {
        #[arg(long)]
        state_slot: u64,
        #[arg(long)]
        withdrawal_slot: u64,
        #[arg(long)]
        validator_index: u64,
    },
}

impl Command {
    fn default_output(&self) -> PathBuf {
        match self {
            Self::Validator {
                validator_index, ..
            } => PathBuf::from(format!("validator_proof_{validator_index}.json")),
            Self::Withdrawal {
                validator_index, ..
            } => PathBuf::from(format!("withdrawal_proof_{validator_index}.json")),
        }
    }
}

fn write_json<T: Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let chain = ChainSpec::resolve(cli.chain_id, cli.capella_fork_slot)?;
    tracing::info!(%chain, beacon_url = %cli.beacon_url, "Using beacon node");

    let orchestrator = ProofOrchestrator::new(
        Arc::new(BeaconClient::new(cli.beacon_url.clone())),
        Arc::new(StateProver::new(chain)),
    );
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.command.default_output());

    match cli.command {
        Command::Validator {
            slot,
            validator_index,
        } => {
            let bundle = orchestrator
                .get_validator_proof(slot, validator_index)
                .await
                .with_context(|| {
                    format!("Failed to prove validator {validator_index} at slot {slot}")
                })?;
            tracing::info!(
                state_root = %format!("0x{}", hex::encode(bundle.state_root)),
                validator_proof_len = bundle.validator_proof.len(),
                "Validator proof generated"
            );
            write_json(&output, &bundle)?;
        }
        Command::Withdrawal {
            state_slot,
            withdrawal_slot,
            validator_index,
        } => {
            let bundle = orchestrator
                .get_withdrawal_proof(state_slot, withdrawal_slot, validator_index)
                .await
                .with_context(|| {
                    format!(
                        "Failed to prove withdrawal of validator {validator_index} \
                         at slot {withdrawal_slot} from state {state_slot}"
                    )
                })?;
            tracing::info!(
                historical_summary_index = bundle.historical_summary_index,
                block_root_index = bundle.block_root_index,
                withdrawal_index = bundle.withdrawal_index_within_block,
                "Withdrawal proof generated"
            );
            write_json(&output, &bundle)?;
        }
    }

    tracing::info!(path = %output.display(), "Saved proof bundle");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_subcommand() {
        let cli = Cli::parse_from([
            "fetch-and-prove",
            "--chain-id",
            "17000",
            "withdrawal",
            "--state-slot",
            "2300000",
            "--withdrawal-slot",
            "2129382",
            "--validator-index",
            "1647525",
        ]);
        assert_eq!(cli.chain_id, 17_000);
        assert_eq!(
            cli.command.default_output(),
            PathBuf::from("withdrawal_proof_1647525.json")
        );
        assert!(matches!(
            cli.command,
            Command::Withdrawal {
                state_slot: 2_300_000,
                withdrawal_slot: 2_129_382,
                ..
            }
        ));
    }

    #[test]
    fn test_validator_subcommand_with_output() {
        let cli = Cli::parse_from([
            "fetch-and-prove",
            "--output",
            "out.json",
            "validator",
            "--slot",
            "2300000",
            "--validator-index",
            "7",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.command.default_output(), PathBuf::from("validator_proof_7.json"));
    }

    #[test]
    fn test_custom_network_capella_slot() {
        let cli = Cli::parse_from([
            "fetch-and-prove",
            "--chain-id",
            "1337",
            "--capella-fork-slot",
            "16384",
            "validator",
            "--slot",
            "20000",
            "--validator-index",
            "0",
        ]);
        let chain = ChainSpec::resolve(cli.chain_id, cli.capella_fork_slot).unwrap();
        assert_eq!(chain.chain_id, 1337);
        assert_eq!(chain.capella_fork_slot, 16_384);

        let cli = Cli::parse_from([
            "fetch-and-prove",
            "--chain-id",
            "1337",
            "validator",
            "--slot",
            "20000",
            "--validator-index",
            "0",
        ]);
        assert!(ChainSpec::resolve(cli.chain_id, cli.capella_fork_slot).is_err());
    }
}
