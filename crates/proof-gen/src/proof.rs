//! Proof bundles and the request-level error taxonomy.
//!
//! The bundles are consumed by an on-chain verifier; their field order is a
//! wire contract. Serde emits fields in declaration order, so the structs
//! below must not be reordered. `FIELD_NAMES` pins the order in tests and for
//! the ABI encoder.

use crate::beacon_client::BeaconClientError;
use crate::engine::EngineError;
use crate::types::{hex_bytes32, Root};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the orchestrator. Exactly one per failed request.
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("data unavailable: {0}")]
    DataUnavailable(#[source] BeaconClientError),

    #[error("unsupported state version: {0}")]
    UnsupportedStateVersion(String),

    #[error("validator index {index} out of range ({count} validators)")]
    IndexOutOfRange { index: u64, count: usize },

    #[error("withdrawal slot {withdrawal_slot} unprovable from state slot {state_slot}: {reason}")]
    UnprovableRange {
        state_slot: u64,
        withdrawal_slot: u64,
        reason: String,
    },

    #[error("no withdrawal for validator {validator_index} in block at slot {slot}")]
    WithdrawalNotFound { validator_index: u64, slot: u64 },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("proof primitive failure: {0}")]
    PrimitiveFailure(String),
}

/// Stable, label-friendly classification of [`ProofError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofErrorKind {
    DataUnavailable,
    UnsupportedStateVersion,
    IndexOutOfRange,
    UnprovableRange,
    WithdrawalNotFound,
    Timeout,
    PrimitiveFailure,
}

impl ProofErrorKind {
    pub const ALL: [Self; 7] = [
        Self::DataUnavailable,
        Self::UnsupportedStateVersion,
        Self::IndexOutOfRange,
        Self::UnprovableRange,
        Self::WithdrawalNotFound,
        Self::Timeout,
        Self::PrimitiveFailure,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataUnavailable => "data_unavailable",
            Self::UnsupportedStateVersion => "unsupported_state_version",
            Self::IndexOutOfRange => "index_out_of_range",
            Self::UnprovableRange => "unprovable_range",
            Self::WithdrawalNotFound => "withdrawal_not_found",
            Self::Timeout => "timeout",
            Self::PrimitiveFailure => "primitive_failure",
        }
    }
}

impl fmt::Display for ProofErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProofError {
    #[must_use]
    pub fn kind(&self) -> ProofErrorKind {
        match self {
            Self::DataUnavailable(_) => ProofErrorKind::DataUnavailable,
            Self::UnsupportedStateVersion(_) => ProofErrorKind::UnsupportedStateVersion,
            Self::IndexOutOfRange { .. } => ProofErrorKind::IndexOutOfRange,
            Self::UnprovableRange { .. } => ProofErrorKind::UnprovableRange,
            Self::WithdrawalNotFound { .. } => ProofErrorKind::WithdrawalNotFound,
            Self::Timeout(_) => ProofErrorKind::Timeout,
            Self::PrimitiveFailure(_) => ProofErrorKind::PrimitiveFailure,
        }
    }

    /// Whether the data source positively reported the object as missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DataUnavailable(e) if e.is_not_found())
    }
}

impl From<BeaconClientError> for ProofError {
    fn from(err: BeaconClientError) -> Self {
        match err {
            BeaconClientError::UnsupportedVersion(version) => Self::UnsupportedStateVersion(version),
            other => Self::DataUnavailable(other),
        }
    }
}

impl From<EngineError> for ProofError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::ValidatorIndexOutOfRange { index, count } => {
                Self::IndexOutOfRange { index, count }
            }
            EngineError::UnprovableRange {
                state_slot,
                withdrawal_slot,
                reason,
            } => Self::UnprovableRange {
                state_slot,
                withdrawal_slot,
                reason,
            },
            EngineError::WithdrawalNotFound {
                validator_index,
                slot,
            } => Self::WithdrawalNotFound {
                validator_index,
                slot,
            },
            other @ (EngineError::Merkleization(_) | EngineError::Inconsistent(_)) => {
                Self::PrimitiveFailure(other.to_string())
            }
        }
    }
}

/// Response of `GetValidatorProof`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorProofBundle {
    /// State root committed to by the block header
    #[serde(with = "hex_bytes32")]
    pub state_root: Root,

    /// `state_root` against the block header root
    #[serde(with = "proof_vec_serde")]
    pub state_root_proof: Vec<Root>,

    /// Field roots of the validator container
    #[serde(with = "proof_vec_serde")]
    pub validator_fields: Vec<Root>,

    /// Validator container against `state_root`
    #[serde(with = "proof_vec_serde")]
    pub validator_proof: Vec<Root>,
}

impl ValidatorProofBundle {
    pub const FIELD_NAMES: [&'static str; 4] = [
        "stateRoot",
        "stateRootProof",
        "validatorFields",
        "validatorProof",
    ];
}

/// Response of `GetWithdrawalProof`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProofBundle {
    #[serde(with = "hex_bytes32")]
    pub state_root: Root,
    #[serde(with = "proof_vec_serde")]
    pub state_root_proof: Vec<Root>,
    #[serde(with = "proof_vec_serde")]
    pub validator_fields: Vec<Root>,
    #[serde(with = "proof_vec_serde")]
    pub validator_proof: Vec<Root>,

    /// Root of the withdrawal block
    #[serde(with = "hex_bytes32")]
    pub historical_summary_block_root: Root,
    /// Withdrawal block root against `state_root` via `historical_summaries`
    #[serde(with = "proof_vec_serde")]
    pub historical_summary_block_root_proof: Vec<Root>,

    /// Slot of the withdrawal block
    #[serde(with = "hex_bytes32")]
    pub slot_root: Root,
    /// Slot against the oracle block header
    #[serde(with = "proof_vec_serde")]
    pub slot_root_proof: Vec<Root>,

    #[serde(with = "hex_bytes32")]
    pub timestamp_root: Root,
    /// Timestamp against the execution payload root
    #[serde(with = "proof_vec_serde")]
    pub timestamp_root_proof: Vec<Root>,

    #[serde(with = "hex_bytes32")]
    pub execution_payload_root: Root,
    /// Execution payload against the withdrawal block root
    #[serde(with = "proof_vec_serde")]
    pub execution_payload_root_proof: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub withdrawal_fields: Vec<Root>,
    /// Withdrawal container against the execution payload root
    #[serde(with = "proof_vec_serde")]
    pub withdrawal_proof: Vec<Root>,

    pub historical_summary_index: u64,
    pub block_root_index: u64,
    pub withdrawal_index_within_block: u64,
}

impl WithdrawalProofBundle {
    pub const FIELD_NAMES: [&'static str; 17] = [
        "stateRoot",
        "stateRootProof",
        "validatorFields",
        "validatorProof",
        "historicalSummaryBlockRoot",
        "historicalSummaryBlockRootProof",
        "slotRoot",
        "slotRootProof",
        "timestampRoot",
        "timestampRootProof",
        "executionPayloadRoot",
        "executionPayloadRootProof",
        "withdrawalFields",
        "withdrawalProof",
        "historicalSummaryIndex",
        "blockRootIndex",
        "withdrawalIndexWithinBlock",
    ];
}

/// Custom serde for Vec<[u8; 32]> as hex strings
mod proof_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data.iter().map(|h| format!("0x{}", hex::encode(h))).collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .into_iter()
            .map(|s| {
                let s = s.strip_prefix("0x").unwrap_or(&s);
                let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
                bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
            })
            .collect()
    }
}
