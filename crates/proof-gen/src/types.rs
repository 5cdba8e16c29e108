//! Beacon Chain SSZ Types
//!
//! Containers shared by the Deneb and Electra layouts. Everything derives
//! `ssz_rs` traits so that field roots and small-container proofs come
//! straight from `hash_tree_root()` / `prove()`.

use preset::{MAX_WITHDRAWALS_PER_PAYLOAD, SYNC_COMMITTEE_SIZE};
use ssz_rs::prelude::*;
use std::fmt;
use std::str::FromStr;

/// 32-byte Merkle node, as carried in headers and proofs.
pub type Root = [u8; 32];

/// BLS public key (48 bytes)
pub type BlsPubkey = Vector<u8, 48>;

/// BLS signature (96 bytes)
pub type BlsSignature = Vector<u8, 96>;

/// Mainnet preset constants
pub mod preset {
    /// Maximum number of validators (2^40)
    pub const VALIDATOR_REGISTRY_LIMIT: usize = 1_099_511_627_776;
    /// Validators list data tree depth
    pub const VALIDATOR_REGISTRY_DEPTH: u32 = 40;
    /// Block roots ring buffer length
    pub const SLOTS_PER_HISTORICAL_ROOT: usize = 8192;
    /// Block roots ring buffer tree depth
    pub const SLOTS_PER_HISTORICAL_ROOT_DEPTH: u32 = 13;
    /// Historical roots / summaries limit (2^24)
    pub const HISTORICAL_ROOTS_LIMIT: usize = 16_777_216;
    /// Historical summaries list data tree depth
    pub const HISTORICAL_ROOTS_DEPTH: u32 = 24;
    /// Randao mixes vector length
    pub const EPOCHS_PER_HISTORICAL_VECTOR: usize = 65_536;
    /// Slashings vector length
    pub const EPOCHS_PER_SLASHINGS_VECTOR: usize = 8192;
    /// Eth1 votes per voting period (64 epochs * 32 slots)
    pub const ETH1_DATA_VOTES_LIMIT: usize = 2048;
    /// Sync committee size
    pub const SYNC_COMMITTEE_SIZE: usize = 512;
    /// Withdrawals per execution payload
    pub const MAX_WITHDRAWALS_PER_PAYLOAD: usize = 16;
    /// Withdrawals list data tree depth
    pub const WITHDRAWALS_DEPTH: u32 = 4;
}

/// Consensus fork a state or block was produced under.
///
/// Parsed from the `Eth-Consensus-Version` header of beacon API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsensusVersion {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
    Fulu,
}

impl ConsensusVersion {
    /// Lowercase name as used by the beacon API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Phase0 => "phase0",
            Self::Altair => "altair",
            Self::Bellatrix => "bellatrix",
            Self::Capella => "capella",
            Self::Deneb => "deneb",
            Self::Electra => "electra",
            Self::Fulu => "fulu",
        }
    }

    /// Whether states and blocks of this fork can be decoded and proven.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Deneb | Self::Electra)
    }
}

impl fmt::Display for ConsensusVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsensusVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phase0" => Ok(Self::Phase0),
            "altair" => Ok(Self::Altair),
            "bellatrix" => Ok(Self::Bellatrix),
            "capella" => Ok(Self::Capella),
            "deneb" => Ok(Self::Deneb),
            "electra" => Ok(Self::Electra),
            "fulu" => Ok(Self::Fulu),
            other => Err(other.to_string()),
        }
    }
}

/// Beacon block header
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockHeader {
    /// Slot number
    pub slot: u64,
    /// Proposer validator index
    pub proposer_index: u64,
    /// Root of the parent block
    pub parent_root: Root,
    /// Root of the beacon state
    pub state_root: Root,
    /// Root of the block body
    pub body_root: Root,
}

/// Validator record from the beacon state
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Validator {
    /// BLS public key (48 bytes)
    pub pubkey: BlsPubkey,
    /// Withdrawal credentials (32 bytes)
    pub withdrawal_credentials: Root,
    /// Effective balance in Gwei
    pub effective_balance: u64,
    /// Whether the validator is slashed
    pub slashed: bool,
    /// Epoch when validator became eligible for activation
    pub activation_eligibility_epoch: u64,
    /// Epoch when validator was activated
    pub activation_epoch: u64,
    /// Epoch when validator will exit
    pub exit_epoch: u64,
    /// Epoch when validator can withdraw
    pub withdrawable_epoch: u64,
}

impl Validator {
    /// Roots of the eight validator fields, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(vec![
            self.pubkey.hash_tree_root()?.into(),
            self.withdrawal_credentials.hash_tree_root()?.into(),
            self.effective_balance.hash_tree_root()?.into(),
            self.slashed.hash_tree_root()?.into(),
            self.activation_eligibility_epoch.hash_tree_root()?.into(),
            self.activation_epoch.hash_tree_root()?.into(),
            self.exit_epoch.hash_tree_root()?.into(),
            self.withdrawable_epoch.hash_tree_root()?.into(),
        ])
    }
}

/// Checkpoint for finality
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Checkpoint {
    pub epoch: u64,
    pub root: Root,
}

/// Eth1 deposit data
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Eth1Data {
    pub deposit_root: Root,
    pub deposit_count: u64,
    pub block_hash: Root,
}

/// Fork data
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Fork {
    pub previous_version: [u8; 4],
    pub current_version: [u8; 4],
    pub epoch: u64,
}

/// Historical summary (Capella+)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct HistoricalSummary {
    /// Root of the `block_roots` vector at the end of the period
    pub block_summary_root: Root,
    /// Root of the `state_roots` vector at the end of the period
    pub state_summary_root: Root,
}

/// Sync committee (Altair+)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SyncCommittee {
    pub pubkeys: Vector<BlsPubkey, SYNC_COMMITTEE_SIZE>,
    pub aggregate_pubkey: BlsPubkey,
}

/// Withdrawal record carried in an execution payload
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Withdrawal {
    /// Global withdrawal index
    pub index: u64,
    /// Validator the withdrawal belongs to
    pub validator_index: u64,
    /// Execution address receiving the funds
    pub address: [u8; 20],
    /// Amount in Gwei
    pub amount: u64,
}

impl Withdrawal {
    /// Roots of the four withdrawal fields, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(vec![
            self.index.hash_tree_root()?.into(),
            self.validator_index.hash_tree_root()?.into(),
            self.address.hash_tree_root()?.into(),
            self.amount.hash_tree_root()?.into(),
        ])
    }
}

/// Execution payload (Deneb layout, unchanged in Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayload {
    pub parent_hash: Root,
    pub fee_recipient: [u8; 20],
    pub state_root: Root,
    pub receipts_root: Root,
    pub logs_bloom: Vector<u8, 256>,
    pub prev_randao: Root,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, 32>,
    pub base_fee_per_gas: U256,
    pub block_hash: Root,
    pub transactions: List<List<u8, 1_073_741_824>, 1_048_576>,
    pub withdrawals: List<Withdrawal, MAX_WITHDRAWALS_PER_PAYLOAD>,
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

impl ExecutionPayload {
    /// Number of fields in the payload container
    pub const FIELD_COUNT: usize = 17;

    /// Roots of all payload fields, in container order.
    ///
    /// # Errors
    /// Returns an error if a field cannot be merkleized.
    pub fn field_roots(&self) -> Result<Vec<Root>, MerkleizationError> {
        Ok(vec![
            self.parent_hash.hash_tree_root()?.into(),
            self.fee_recipient.hash_tree_root()?.into(),
            self.state_root.hash_tree_root()?.into(),
            self.receipts_root.hash_tree_root()?.into(),
            self.logs_bloom.hash_tree_root()?.into(),
            self.prev_randao.hash_tree_root()?.into(),
            self.block_number.hash_tree_root()?.into(),
            self.gas_limit.hash_tree_root()?.into(),
            self.gas_used.hash_tree_root()?.into(),
            self.timestamp.hash_tree_root()?.into(),
            self.extra_data.hash_tree_root()?.into(),
            self.base_fee_per_gas.hash_tree_root()?.into(),
            self.block_hash.hash_tree_root()?.into(),
            self.transactions.hash_tree_root()?.into(),
            self.withdrawals.hash_tree_root()?.into(),
            self.blob_gas_used.hash_tree_root()?.into(),
            self.excess_blob_gas.hash_tree_root()?.into(),
        ])
    }
}

/// Execution payload header stored in the state (Deneb layout, unchanged in Electra)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadHeader {
    pub parent_hash: Root,
    pub fee_recipient: [u8; 20],
    pub state_root: Root,
    pub receipts_root: Root,
    pub logs_bloom: Vector<u8, 256>,
    pub prev_randao: Root,
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, 32>,
    pub base_fee_per_gas: U256,
    pub block_hash: Root,
    pub transactions_root: Root,
    pub withdrawals_root: Root,
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

/// Little-endian chunk for a `uint64` leaf.
#[must_use]
pub fn u64_chunk(value: u64) -> Root {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

// Hex encoding helpers for serde
pub(crate) mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
