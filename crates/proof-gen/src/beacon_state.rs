//! Beacon State SSZ Types
//!
//! Full mainnet-preset `BeaconState` layouts for the forks we can prove
//! against:
//! - Deneb: 28 fields (tree depth 5)
//! - Electra: 37 fields (tree depth 6)
//!
//! Field positions shared by both layouts live in [`field`]; Electra only
//! appends fields, so every index below 28 means the same thing in both.

use crate::sparse_proof::container_depth;
use crate::types::preset::{
    EPOCHS_PER_HISTORICAL_VECTOR, EPOCHS_PER_SLASHINGS_VECTOR, ETH1_DATA_VOTES_LIMIT,
    HISTORICAL_ROOTS_LIMIT, SLOTS_PER_HISTORICAL_ROOT, VALIDATOR_REGISTRY_LIMIT,
};
use crate::types::{
    BeaconBlockHeader, BlsPubkey, BlsSignature, Checkpoint, ConsensusVersion, Eth1Data,
    ExecutionPayloadHeader, Fork, HistoricalSummary, Root, SyncCommittee, Validator,
};
use ssz_rs::prelude::*;
use thiserror::Error;

/// Indices of the state fields we prove against
pub mod field {
    pub const SLOT: usize = 2;
    pub const VALIDATORS: usize = 11;
    pub const HISTORICAL_SUMMARIES: usize = 27;
}

/// Failure to turn beacon API bytes into a typed container
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported consensus version: {0}")]
    UnsupportedVersion(ConsensusVersion),

    #[error("SSZ decoding failed: {0}")]
    Ssz(String),
}

/// Pending deposit entry (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingDeposit {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: Root,
    pub amount: u64,
    pub signature: BlsSignature,
    pub slot: u64,
}

/// Pending partial withdrawal (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingPartialWithdrawal {
    pub validator_index: u64,
    pub amount: u64,
    pub withdrawable_epoch: u64,
}

/// Pending consolidation entry (Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct PendingConsolidation {
    pub source_index: u64,
    pub target_index: u64,
}

/// Deneb `BeaconState`, mainnet preset
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DenebBeaconState {
    pub genesis_time: u64,
    pub genesis_validators_root: Root,
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vector<Root, SLOTS_PER_HISTORICAL_ROOT>,
    pub state_roots: Vector<Root, SLOTS_PER_HISTORICAL_ROOT>,
    pub historical_roots: List<Root, HISTORICAL_ROOTS_LIMIT>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, ETH1_DATA_VOTES_LIMIT>,
    pub eth1_deposit_index: u64,
    pub validators: List<Validator, VALIDATOR_REGISTRY_LIMIT>,
    pub balances: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub randao_mixes: Vector<Root, EPOCHS_PER_HISTORICAL_VECTOR>,
    pub slashings: Vector<u64, EPOCHS_PER_SLASHINGS_VECTOR>,
    pub previous_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub current_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub justification_bits: Bitvector<4>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub inactivity_scores: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: SyncCommittee,
    pub latest_execution_payload_header: ExecutionPayloadHeader,
    pub next_withdrawal_index: u64,
    pub next_withdrawal_validator_index: u64,
    pub historical_summaries: List<HistoricalSummary, HISTORICAL_ROOTS_LIMIT>,
}

/// Electra `BeaconState`, mainnet preset
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ElectraBeaconState {
    pub genesis_time: u64,
    pub genesis_validators_root: Root,
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    pub block_roots: Vector<Root, SLOTS_PER_HISTORICAL_ROOT>,
    pub state_roots: Vector<Root, SLOTS_PER_HISTORICAL_ROOT>,
    pub historical_roots: List<Root, HISTORICAL_ROOTS_LIMIT>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, ETH1_DATA_VOTES_LIMIT>,
    pub eth1_deposit_index: u64,
    pub validators: List<Validator, VALIDATOR_REGISTRY_LIMIT>,
    pub balances: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub randao_mixes: Vector<Root, EPOCHS_PER_HISTORICAL_VECTOR>,
    pub slashings: Vector<u64, EPOCHS_PER_SLASHINGS_VECTOR>,
    pub previous_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub current_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub justification_bits: Bitvector<4>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
    pub inactivity_scores: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: SyncCommittee,
    pub latest_execution_payload_header: ExecutionPayloadHeader,
    pub next_withdrawal_index: u64,
    pub next_withdrawal_validator_index: u64,
    pub historical_summaries: List<HistoricalSummary, HISTORICAL_ROOTS_LIMIT>,
    // Electra additions
    pub deposit_requests_start_index: u64,
    pub deposit_balance_to_consume: u64,
    pub exit_balance_to_consume: u64,
    pub earliest_exit_epoch: u64,
    pub consolidation_balance_to_consume: u64,
    pub earliest_consolidation_epoch: u64,
    pub pending_deposits: List<PendingDeposit, 134_217_728>,
    pub pending_partial_withdrawals: List<PendingPartialWithdrawal, 134_217_728>,
    pub pending_consolidations: List<PendingConsolidation, 262_144>,
}

impl DenebBeaconState {
    pub const FIELD_COUNT: usize = 28;

    /// Roots of every top-level field, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(field_roots!(self;
            genesis_time, genesis_validators_root, slot, fork, latest_block_header,
            block_roots, state_roots, historical_roots, eth1_data, eth1_data_votes,
            eth1_deposit_index, validators, balances, randao_mixes, slashings,
            previous_epoch_participation, current_epoch_participation, justification_bits,
            previous_justified_checkpoint, current_justified_checkpoint, finalized_checkpoint,
            inactivity_scores, current_sync_committee, next_sync_committee,
            latest_execution_payload_header, next_withdrawal_index,
            next_withdrawal_validator_index, historical_summaries,
        ))
    }
}

impl ElectraBeaconState {
    pub const FIELD_COUNT: usize = 37;

    /// Roots of every top-level field, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(field_roots!(self;
            genesis_time, genesis_validators_root, slot, fork, latest_block_header,
            block_roots, state_roots, historical_roots, eth1_data, eth1_data_votes,
            eth1_deposit_index, validators, balances, randao_mixes, slashings,
            previous_epoch_participation, current_epoch_participation, justification_bits,
            previous_justified_checkpoint, current_justified_checkpoint, finalized_checkpoint,
            inactivity_scores, current_sync_committee, next_sync_committee,
            latest_execution_payload_header, next_withdrawal_index,
            next_withdrawal_validator_index, historical_summaries,
            deposit_requests_start_index, deposit_balance_to_consume, exit_balance_to_consume,
            earliest_exit_epoch, consolidation_balance_to_consume, earliest_consolidation_epoch,
            pending_deposits, pending_partial_withdrawals, pending_consolidations,
        ))
    }
}

/// A beacon state tagged with the fork it was decoded under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedBeaconState {
    Deneb(Box<DenebBeaconState>),
    Electra(Box<ElectraBeaconState>),
}

impl VersionedBeaconState {
    /// Decode SSZ bytes served for a state of the given fork.
    ///
    /// # Errors
    /// Fails for forks other than Deneb/Electra and for malformed bytes.
    pub fn from_ssz(version: ConsensusVersion, bytes: &[u8]) -> Result<Self, DecodeError> {
        match version {
            ConsensusVersion::Deneb => ssz_rs::deserialize::<DenebBeaconState>(bytes)
                .map(|s| Self::Deneb(Box::new(s)))
                .map_err(|e| DecodeError::Ssz(format!("{e:?}"))),
            ConsensusVersion::Electra => ssz_rs::deserialize::<ElectraBeaconState>(bytes)
                .map(|s| Self::Electra(Box::new(s)))
                .map_err(|e| DecodeError::Ssz(format!("{e:?}"))),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }

    #[must_use]
    pub fn version(&self) -> ConsensusVersion {
        match self {
            Self::Deneb(_) => ConsensusVersion::Deneb,
            Self::Electra(_) => ConsensusVersion::Electra,
        }
    }

    #[must_use]
    pub fn slot(&self) -> u64 {
        match self {
            Self::Deneb(s) => s.slot,
            Self::Electra(s) => s.slot,
        }
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        match self {
            Self::Deneb(s) => &s.validators[..],
            Self::Electra(s) => &s.validators[..],
        }
    }

    /// The 8192-entry block roots ring buffer
    #[must_use]
    pub fn block_roots(&self) -> &[Root] {
        match self {
            Self::Deneb(s) => &s.block_roots[..],
            Self::Electra(s) => &s.block_roots[..],
        }
    }

    #[must_use]
    pub fn historical_summaries(&self) -> &[HistoricalSummary] {
        match self {
            Self::Deneb(s) => &s.historical_summaries[..],
            Self::Electra(s) => &s.historical_summaries[..],
        }
    }

    /// Number of top-level fields in this fork's layout
    #[must_use]
    pub fn field_count(&self) -> usize {
        match self {
            Self::Deneb(_) => DenebBeaconState::FIELD_COUNT,
            Self::Electra(_) => ElectraBeaconState::FIELD_COUNT,
        }
    }

    /// Depth of the top-level state tree (5 for Deneb, 6 for Electra)
    #[must_use]
    pub fn tree_depth(&self) -> u32 {
        container_depth(self.field_count())
    }

    /// Roots of every top-level field, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        match self {
            Self::Deneb(s) => s.field_roots(),
            Self::Electra(s) => s.field_roots(),
        }
    }
}

impl From<DenebBeaconState> for VersionedBeaconState {
    fn from(state: DenebBeaconState) -> Self {
        Self::Deneb(Box::new(state))
    }
}

impl From<ElectraBeaconState> for VersionedBeaconState {
    fn from(state: ElectraBeaconState) -> Self {
        Self::Electra(Box::new(state))
    }
}
