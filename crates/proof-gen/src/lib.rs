//! # Proof Generation Library
//!
//! Beacon-chain proof orchestration for on-chain verifiers. Produces SSZ
//! Merkle proofs for:
//! - `validators[i]` against a block header's state root
//! - a validator's withdrawal in an earlier block, anchored to a later
//!   state through `historical_summaries`

/// Hash tree roots of the named container fields, in the order given.
/// Expands inside a function returning `Result<_, MerkleizationError>`.
macro_rules! field_roots {
    ($container:expr; $($name:ident),+ $(,)?) => {
        vec![$(::ssz_rs::HashTreeRoot::hash_tree_root(&$container.$name)?.into()),+]
    };
}

pub mod beacon_block;
pub mod beacon_client;
pub mod beacon_state;
pub mod chain_spec;
pub mod engine;
pub mod gindex;
pub mod orchestrator;
pub mod proof;
pub mod resolver;
pub mod sparse_proof;
pub mod state_prover;
pub mod types;

pub use beacon_block::VersionedSignedBeaconBlock;
pub use beacon_client::{BeaconClient, BeaconClientError, ChainDataSource};
pub use beacon_state::VersionedBeaconState;
pub use chain_spec::{ChainSpec, ChainSpecError};
pub use engine::{EngineError, ProofComponent, ProofPrimitiveEngine, WithdrawalIndexParams};
pub use gindex::GindexCalculator;
pub use orchestrator::ProofOrchestrator;
pub use proof::{ProofError, ProofErrorKind, ValidatorProofBundle, WithdrawalProofBundle};
pub use resolver::WithdrawalIndexResolver;
pub use state_prover::StateProver;
pub use types::*;
