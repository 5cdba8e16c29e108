//! Proof primitive engine interface
//!
//! Single-purpose Merkle proofs over data that has already been fetched.
//! Implementations are pure and synchronous; the orchestrator runs them on
//! the blocking pool and only sequences their inputs and outputs.

use crate::beacon_block::VersionedSignedBeaconBlock;
use crate::beacon_state::VersionedBeaconState;
use crate::types::{BeaconBlockHeader, ConsensusVersion, Root, Validator};
use ssz_rs::prelude::MerkleizationError;
use thiserror::Error;

/// One Merkle inclusion proof: `leaf` at `gindex` under `root`, with
/// `branch` ordered from the leaf's sibling up to the root's child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofComponent {
    pub leaf: Root,
    pub branch: Vec<Root>,
    pub gindex: u64,
    pub root: Root,
}

/// First-level subtree roots of a beacon state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelRoots {
    pub version: ConsensusVersion,
    pub slot: u64,
    /// One root per state field, in container order
    pub field_roots: Vec<Root>,
    /// Root over `field_roots`
    pub state_root: Root,
}

/// Validator container fields plus their inclusion proof against a state root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorProof {
    /// The 8 field roots of the validator container
    pub fields: Vec<Root>,
    pub proof: ProofComponent,
}

/// State root against header plus validator against state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorFieldsProof {
    pub state_root_proof: ProofComponent,
    pub validator: ValidatorProof,
}

/// Where a withdrawal slot's block root lives relative to a later state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalIndexParams {
    /// Index into `historical_summaries`
    pub historical_summary_index: u64,
    /// Index into the 8192-entry `block_roots` snapshot of that summary
    pub block_root_index: u64,
    /// Slot whose state holds that snapshot as its `block_roots`
    pub group_slot: u64,
}

/// Everything `prove_withdrawal` derives from the withdrawal block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalProofComponents {
    /// Position of the validator's withdrawal within the payload
    pub withdrawal_index: u64,
    /// The 4 field roots of the withdrawal container
    pub withdrawal_fields: Vec<Root>,
    /// Withdrawal container against the execution payload root
    pub withdrawal_proof: ProofComponent,
    /// `slot` chunk of the withdrawal block
    pub slot_root: Root,
    /// `timestamp` against the execution payload root
    pub timestamp_proof: ProofComponent,
    /// Execution payload against the withdrawal block root
    pub execution_payload_proof: ProofComponent,
    /// Withdrawal block root against the oracle state root
    pub historical_summary_block_root_proof: ProofComponent,
    pub index_params: WithdrawalIndexParams,
}

/// Failures of the proof primitives
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validator index {index} out of range ({count} validators)")]
    ValidatorIndexOutOfRange { index: u64, count: usize },

    #[error("withdrawal slot {withdrawal_slot} not provable from state slot {state_slot}: {reason}")]
    UnprovableRange {
        state_slot: u64,
        withdrawal_slot: u64,
        reason: String,
    },

    #[error("no withdrawal for validator {validator_index} in block at slot {slot}")]
    WithdrawalNotFound { validator_index: u64, slot: u64 },

    #[error("merkleization failed: {0}")]
    Merkleization(String),

    #[error("inconsistent input: {0}")]
    Inconsistent(String),
}

impl EngineError {
    pub(crate) fn merkleization(err: MerkleizationError) -> Self {
        Self::Merkleization(format!("{err:?}"))
    }
}

/// Merkle proof primitives over fetched chain data.
///
/// Every method is a pure function of its arguments.
pub trait ProofPrimitiveEngine: Send + Sync + 'static {
    /// Roots of every top-level state field, plus the state root.
    ///
    /// # Errors
    /// Fails if the state cannot be merkleized.
    fn compute_top_level_roots(
        &self,
        state: &VersionedBeaconState,
    ) -> Result<TopLevelRoots, EngineError>;

    /// Prove `validators[index]` against the state described by `roots`.
    ///
    /// # Errors
    /// Fails for an index outside `validators`, or if `slot` does not match
    /// the state the roots were computed from.
    fn prove_validator_against_state(
        &self,
        roots: &TopLevelRoots,
        slot: u64,
        validators: &[Validator],
        index: u64,
    ) -> Result<ValidatorProof, EngineError>;

    /// State root against `header` and `validators[index]` against the state.
    ///
    /// # Errors
    /// Fails for an out-of-range index or a state that does not match `header`.
    fn prove_validator_fields(
        &self,
        header: &BeaconBlockHeader,
        state: &VersionedBeaconState,
        index: u64,
    ) -> Result<ValidatorFieldsProof, EngineError>;

    /// `header.state_root` against the header root.
    ///
    /// # Errors
    /// Fails if the header cannot be merkleized.
    fn prove_state_root_against_header(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<ProofComponent, EngineError>;

    /// `header.slot` against the header root.
    ///
    /// # Errors
    /// Fails if the header cannot be merkleized.
    fn prove_slot_against_header(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<ProofComponent, EngineError>;

    /// Prove `validator_index`'s withdrawal in `block`, and `block`'s root
    /// against `state` through `historical_summaries`.
    ///
    /// `block_roots_group` is the `block_roots` vector of the state at the
    /// group slot covering `block`.
    ///
    /// # Errors
    /// Fails when the block is not reachable from the state, when the
    /// validator has no withdrawal in the block, or when inputs disagree.
    fn prove_withdrawal(
        &self,
        header: &BeaconBlockHeader,
        state: &VersionedBeaconState,
        roots: &TopLevelRoots,
        block_roots_group: &[Root],
        block: &VersionedSignedBeaconBlock,
        validator_index: u64,
    ) -> Result<WithdrawalProofComponents, EngineError>;

    /// Locate `withdrawal_slot`'s block root relative to `state_slot`.
    ///
    /// # Errors
    /// Fails with `UnprovableRange` when no historical summary written by
    /// `state_slot` covers `withdrawal_slot`.
    fn resolve_withdrawal_index_params(
        &self,
        state_slot: u64,
        withdrawal_slot: u64,
    ) -> Result<WithdrawalIndexParams, EngineError>;
}
