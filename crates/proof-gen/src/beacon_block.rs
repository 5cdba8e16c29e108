//! Signed Beacon Block SSZ Types
//!
//! Deneb (12-field body) and Electra (13-field body) blocks. Only the
//! execution payload is read for proofs; the rest of the body is here so
//! that the body root, and with it the block root, can be recomputed.

use crate::beacon_state::DecodeError;
use crate::types::{
    BeaconBlockHeader, BlsPubkey, BlsSignature, Checkpoint, ConsensusVersion, Eth1Data,
    ExecutionPayload, Root,
};
use ssz_rs::prelude::*;

/// Index of `execution_payload` within the block body (same in both forks)
pub const EXECUTION_PAYLOAD_INDEX: usize = 9;

/// Index of `body_root` within the block header
pub const BODY_ROOT_INDEX: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ProposerSlashing {
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct AttestationData {
    pub slot: u64,
    pub index: u64,
    pub beacon_block_root: Root,
    pub source: Checkpoint,
    pub target: Checkpoint,
}

/// Indexed attestation, generic over the attesting-indices limit
/// (2048 before Electra, 2048 * 64 from Electra on).
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct IndexedAttestation<const N: usize> {
    pub attesting_indices: List<u64, N>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct AttesterSlashing<const N: usize> {
    pub attestation_1: IndexedAttestation<N>,
    pub attestation_2: IndexedAttestation<N>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DenebAttestation {
    pub aggregation_bits: Bitlist<2048>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ElectraAttestation {
    pub aggregation_bits: Bitlist<131_072>,
    pub data: AttestationData,
    pub signature: BlsSignature,
    pub committee_bits: Bitvector<64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DepositData {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: Root,
    pub amount: u64,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Deposit {
    pub proof: Vector<Root, 33>,
    pub data: DepositData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct VoluntaryExit {
    pub epoch: u64,
    pub validator_index: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SyncAggregate {
    pub sync_committee_bits: Bitvector<512>,
    pub sync_committee_signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BlsToExecutionChange {
    pub validator_index: u64,
    pub from_bls_pubkey: BlsPubkey,
    pub to_execution_address: [u8; 20],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBlsToExecutionChange {
    pub message: BlsToExecutionChange,
    pub signature: BlsSignature,
}

/// EIP-6110 deposit request
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DepositRequest {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: Root,
    pub amount: u64,
    pub signature: BlsSignature,
    pub index: u64,
}

/// EIP-7002 withdrawal request
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct WithdrawalRequest {
    pub source_address: [u8; 20],
    pub validator_pubkey: BlsPubkey,
    pub amount: u64,
}

/// EIP-7251 consolidation request
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ConsolidationRequest {
    pub source_address: [u8; 20],
    pub source_pubkey: BlsPubkey,
    pub target_pubkey: BlsPubkey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionRequests {
    pub deposits: List<DepositRequest, 8192>,
    pub withdrawals: List<WithdrawalRequest, 16>,
    pub consolidations: List<ConsolidationRequest, 2>,
}

/// Deneb block body (12 fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DenebBeaconBlockBody {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: Root,
    pub proposer_slashings: List<ProposerSlashing, 16>,
    pub attester_slashings: List<AttesterSlashing<2048>, 2>,
    pub attestations: List<DenebAttestation, 128>,
    pub deposits: List<Deposit, 16>,
    pub voluntary_exits: List<SignedVoluntaryExit, 16>,
    pub sync_aggregate: SyncAggregate,
    pub execution_payload: ExecutionPayload,
    pub bls_to_execution_changes: List<SignedBlsToExecutionChange, 16>,
    pub blob_kzg_commitments: List<Vector<u8, 48>, 4096>,
}

/// Electra block body (13 fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ElectraBeaconBlockBody {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: Root,
    pub proposer_slashings: List<ProposerSlashing, 16>,
    pub attester_slashings: List<AttesterSlashing<131_072>, 1>,
    pub attestations: List<ElectraAttestation, 8>,
    pub deposits: List<Deposit, 16>,
    pub voluntary_exits: List<SignedVoluntaryExit, 16>,
    pub sync_aggregate: SyncAggregate,
    pub execution_payload: ExecutionPayload,
    pub bls_to_execution_changes: List<SignedBlsToExecutionChange, 16>,
    pub blob_kzg_commitments: List<Vector<u8, 48>, 4096>,
    pub execution_requests: ExecutionRequests,
}

impl DenebBeaconBlockBody {
    pub const FIELD_COUNT: usize = 12;

    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(field_roots!(self;
            randao_reveal, eth1_data, graffiti, proposer_slashings, attester_slashings,
            attestations, deposits, voluntary_exits, sync_aggregate, execution_payload,
            bls_to_execution_changes, blob_kzg_commitments,
        ))
    }
}

impl ElectraBeaconBlockBody {
    pub const FIELD_COUNT: usize = 13;

    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(field_roots!(self;
            randao_reveal, eth1_data, graffiti, proposer_slashings, attester_slashings,
            attestations, deposits, voluntary_exits, sync_aggregate, execution_payload,
            bls_to_execution_changes, blob_kzg_commitments, execution_requests,
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DenebBeaconBlock {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: DenebBeaconBlockBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ElectraBeaconBlock {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: Root,
    pub state_root: Root,
    pub body: ElectraBeaconBlockBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DenebSignedBeaconBlock {
    pub message: DenebBeaconBlock,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ElectraSignedBeaconBlock {
    pub message: ElectraBeaconBlock,
    pub signature: BlsSignature,
}

/// Header for a block, with `body_root` computed from its body.
macro_rules! block_header {
    ($block:expr) => {
        BeaconBlockHeader {
            slot: $block.slot,
            proposer_index: $block.proposer_index,
            parent_root: $block.parent_root,
            state_root: $block.state_root,
            body_root: $block.body.hash_tree_root()?.into(),
        }
    };
}

/// A signed block tagged with the fork it was decoded under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedSignedBeaconBlock {
    Deneb(Box<DenebSignedBeaconBlock>),
    Electra(Box<ElectraSignedBeaconBlock>),
}

impl VersionedSignedBeaconBlock {
    /// Decode SSZ bytes served for a block of the given fork.
    ///
    /// # Errors
    /// Fails for forks other than Deneb/Electra and for malformed bytes.
    pub fn from_ssz(version: ConsensusVersion, bytes: &[u8]) -> Result<Self, DecodeError> {
        match version {
            ConsensusVersion::Deneb => ssz_rs::deserialize::<DenebSignedBeaconBlock>(bytes)
                .map(|b| Self::Deneb(Box::new(b)))
                .map_err(|e| DecodeError::Ssz(format!("{e:?}"))),
            ConsensusVersion::Electra => ssz_rs::deserialize::<ElectraSignedBeaconBlock>(bytes)
                .map(|b| Self::Electra(Box::new(b)))
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
            Self::Deneb(b) => b.message.slot,
            Self::Electra(b) => b.message.slot,
        }
    }

    #[must_use]
    pub fn execution_payload(&self) -> &ExecutionPayload {
        match self {
            Self::Deneb(b) => &b.message.body.execution_payload,
            Self::Electra(b) => &b.message.body.execution_payload,
        }
    }

    /// Number of fields in this fork's block body
    #[must_use]
    pub fn body_field_count(&self) -> usize {
        match self {
            Self::Deneb(_) => DenebBeaconBlockBody::FIELD_COUNT,
            Self::Electra(_) => ElectraBeaconBlockBody::FIELD_COUNT,
        }
    }

    /// # Errors
    /// Returns an error if a body field cannot be merkleized.
    pub fn body_field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        match self {
            Self::Deneb(b) => b.message.body.field_roots(),
            Self::Electra(b) => b.message.body.field_roots(),
        }
    }

    /// # Errors
    /// Returns an error if the body cannot be merkleized.
    pub fn header(&self) -> Result<BeaconBlockHeader, MerkleizationError> {
        match self {
            Self::Deneb(b) => Ok(block_header!(b.message)),
            Self::Electra(b) => Ok(block_header!(b.message)),
        }
    }

    /// Root of the (unsigned) block, equal to the root of its header.
    ///
    /// # Errors
    /// Returns an error if the block cannot be merkleized.
    pub fn block_root(&self) -> Result<Root, MerkleizationError> {
        Ok(self.header()?.hash_tree_root()?.into())
    }
}

impl From<DenebSignedBeaconBlock> for VersionedSignedBeaconBlock {
    fn from(block: DenebSignedBeaconBlock) -> Self {
        Self::Deneb(Box::new(block))
    }
}

impl From<ElectraSignedBeaconBlock> for VersionedSignedBeaconBlock {
    fn from(block: ElectraSignedBeaconBlock) -> Self {
        Self::Electra(Box::new(block))
    }
}
