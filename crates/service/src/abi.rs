//! Verifier ABI Encoding
//!
//! Solidity mirrors of the proof bundles. Member order matches the JSON
//! bundles, which is the order the verifier contract decodes.

use alloy::{primitives::B256, sol, sol_types::SolValue};
use proof_gen::{Root, ValidatorProofBundle, WithdrawalProofBundle};

sol! {
    struct ValidatorProof {
        bytes32 stateRoot;
        bytes32[] stateRootProof;
        bytes32[] validatorFields;
        bytes32[] validatorProof;
    }

    struct WithdrawalProof {
        bytes32 stateRoot;
        bytes32[] stateRootProof;
        bytes32[] validatorFields;
        bytes32[] validatorProof;
        bytes32 historicalSummaryBlockRoot;
        bytes32[] historicalSummaryBlockRootProof;
        bytes32 slotRoot;
        bytes32[] slotRootProof;
        bytes32 timestampRoot;
        bytes32[] timestampRootProof;
        bytes32 executionPayloadRoot;
        bytes32[] executionPayloadRootProof;
        bytes32[] withdrawalFields;
        bytes32[] withdrawalProof;
        uint64 historicalSummaryIndex;
        uint64 blockRootIndex;
        uint64 withdrawalIndexWithinBlock;
    }
}

fn words(roots: &[Root]) -> Vec<B256> {
    roots.iter().copied().map(B256::from).collect()
}

impl From<&ValidatorProofBundle> for ValidatorProof {
    fn from(b: &ValidatorProofBundle) -> Self {
        Self {
            stateRoot: b.state_root.into(),
            stateRootProof: words(&b.state_root_proof),
            validatorFields: words(&b.validator_fields),
            validatorProof: words(&b.validator_proof),
        }
    }
}

impl From<&WithdrawalProofBundle> for WithdrawalProof {
    fn from(b: &WithdrawalProofBundle) -> Self {
        Self {
            stateRoot: b.state_root.into(),
            stateRootProof: words(&b.state_root_proof),
            validatorFields: words(&b.validator_fields),
            validatorProof: words(&b.validator_proof),
            historicalSummaryBlockRoot: b.historical_summary_block_root.into(),
            historicalSummaryBlockRootProof: words(&b.historical_summary_block_root_proof),
            slotRoot: b.slot_root.into(),
            slotRootProof: words(&b.slot_root_proof),
            timestampRoot: b.timestamp_root.into(),
            timestampRootProof: words(&b.timestamp_root_proof),
            executionPayloadRoot: b.execution_payload_root.into(),
            executionPayloadRootProof: words(&b.execution_payload_root_proof),
            withdrawalFields: words(&b.withdrawal_fields),
            withdrawalProof: words(&b.withdrawal_proof),
            historicalSummaryIndex: b.historical_summary_index,
            blockRootIndex: b.block_root_index,
            withdrawalIndexWithinBlock: b.withdrawal_index_within_block,
        }
    }
}

#[must_use]
pub fn encode_validator(bundle: &ValidatorProofBundle) -> Vec<u8> {
    ValidatorProof::from(bundle).abi_encode()
}

#[must_use]
pub fn encode_withdrawal(bundle: &WithdrawalProofBundle) -> Vec<u8> {
    WithdrawalProof::from(bundle).abi_encode()
}
