//! State-level Sparse Proof Generator
//!
//! [`ProofPrimitiveEngine`] implementation built on the sparse proof
//! routines. Works with mainnet list limits (2^40 validators, 2^24
//! historical summaries) without allocating full Merkle trees.
//!
//! Every composite proof is assembled leaf-first: inner container proof,
//! then list data proof, then length mix-in, then the outer container
//! proof. Recomputed intermediate roots are compared against the roots the
//! outer layer committed to, so a mismatched input surfaces as
//! [`EngineError::Inconsistent`] instead of an unverifiable proof.

use crate::beacon_block::{VersionedSignedBeaconBlock, BODY_ROOT_INDEX, EXECUTION_PAYLOAD_INDEX};
use crate::beacon_state::{field, VersionedBeaconState};
use crate::chain_spec::ChainSpec;
use crate::engine::{
    EngineError, ProofComponent, ProofPrimitiveEngine, TopLevelRoots, ValidatorFieldsProof,
    ValidatorProof, WithdrawalIndexParams, WithdrawalProofComponents,
};
use crate::gindex::GindexCalculator;
use crate::sparse_proof::{
    container_depth, merkle_root, prove_against_leaf_chunks, prove_container_field,
    prove_list_element, prove_small_container_field,
};
use crate::types::{preset, u64_chunk, BeaconBlockHeader, ExecutionPayload, Root, Validator};
use ssz_rs::prelude::*;
use ssz_rs::HashTreeRoot;

/// Field indices within the execution payload
const PAYLOAD_TIMESTAMP_INDEX: usize = 9;
const PAYLOAD_WITHDRAWALS_INDEX: usize = 14;

/// Header field count (tree depth 3)
const HEADER_FIELD_COUNT: usize = 5;

/// Sparse-proof engine for one network.
#[derive(Debug, Clone, Copy)]
pub struct StateProver {
    spec: ChainSpec,
}

impl StateProver {
    #[must_use]
    pub const fn new(spec: ChainSpec) -> Self {
        Self { spec }
    }

    #[must_use]
    pub const fn chain_spec(&self) -> &ChainSpec {
        &self.spec
    }
}

/// Historical summary coordinates of `withdrawal_slot` as seen from `state_slot`.
///
/// Summaries are appended every 8192 slots from the Capella fork on; the
/// summary at index `i` snapshots the `block_roots` of the state at
/// `capella + (i + 1) * 8192`.
///
/// # Errors
/// `UnprovableRange` if the withdrawal post-dates the state, predates
/// Capella, or its summary has not been written by `state_slot`.
pub fn withdrawal_index_params(
    spec: &ChainSpec,
    state_slot: u64,
    withdrawal_slot: u64,
) -> Result<WithdrawalIndexParams, EngineError> {
    let unprovable = |reason: String| EngineError::UnprovableRange {
        state_slot,
        withdrawal_slot,
        reason,
    };
    let period = preset::SLOTS_PER_HISTORICAL_ROOT as u64;

    if withdrawal_slot > state_slot {
        return Err(unprovable("withdrawal slot is after state slot".into()));
    }
    if withdrawal_slot < spec.capella_fork_slot {
        return Err(unprovable(format!(
            "withdrawal slot predates capella fork slot {}",
            spec.capella_fork_slot
        )));
    }

    let historical_summary_index = (withdrawal_slot - spec.capella_fork_slot) / period;
    let block_root_index = withdrawal_slot % period;
    let group_slot = (historical_summary_index + 1)
        .checked_mul(period)
        .and_then(|offset| offset.checked_add(spec.capella_fork_slot))
        .ok_or_else(|| unprovable("group slot overflows".into()))?;

    if group_slot > state_slot {
        return Err(unprovable(format!(
            "historical summary {historical_summary_index} is written at slot {group_slot}"
        )));
    }

    Ok(WithdrawalIndexParams {
        historical_summary_index,
        block_root_index,
        group_slot,
    })
}

fn header_field_roots(header: &BeaconBlockHeader) -> Vec<Root> {
    vec![
        u64_chunk(header.slot),
        u64_chunk(header.proposer_index),
        header.parent_root,
        header.state_root,
        header.body_root,
    ]
}

fn element_roots<T: HashTreeRoot>(elements: &[T]) -> Result<Vec<Root>, EngineError> {
    elements
        .iter()
        .map(|e| {
            let root = e.hash_tree_root().map_err(EngineError::merkleization)?;
            Ok(root.into())
        })
        .collect()
}

fn check_index(index: u64, count: usize) -> Result<usize, EngineError> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < count)
        .ok_or(EngineError::ValidatorIndexOutOfRange { index, count })
}

fn ensure_root(what: &str, computed: &Root, expected: &Root) -> Result<(), EngineError> {
    if computed == expected {
        Ok(())
    } else {
        Err(EngineError::Inconsistent(format!(
            "{what}: computed 0x{}, expected 0x{}",
            hex::encode(computed),
            hex::encode(expected)
        )))
    }
}

impl StateProver {
    fn prove_header_field(
        header: &BeaconBlockHeader,
        name: &str,
        gindex: u64,
    ) -> Result<ProofComponent, EngineError> {
        let (branch, leaf, root) = prove_small_container_field(header, &[name.into()])
            .map_err(EngineError::merkleization)?;
        Ok(ProofComponent {
            leaf,
            branch,
            gindex,
            root,
        })
    }

    /// `withdrawals[j]` and `timestamp` against the payload root.
    fn prove_payload_fields(
        payload: &ExecutionPayload,
        withdrawal_position: usize,
    ) -> Result<(Root, ProofComponent, ProofComponent), EngineError> {
        let payload_fields = payload.field_roots().map_err(EngineError::merkleization)?;
        let withdrawal_roots = element_roots(&payload.withdrawals[..])?;

        let (mut branch, withdrawals_root) = prove_list_element(
            &withdrawal_roots,
            withdrawal_position,
            preset::WITHDRAWALS_DEPTH,
        );
        ensure_root(
            "withdrawals root",
            &withdrawals_root,
            &payload_fields[PAYLOAD_WITHDRAWALS_INDEX],
        )?;
        let (payload_branch, payload_root) = prove_container_field(
            &payload_fields,
            PAYLOAD_WITHDRAWALS_INDEX,
            ExecutionPayload::FIELD_COUNT,
        );
        branch.extend_from_slice(&payload_branch);

        let withdrawal_proof = ProofComponent {
            leaf: withdrawal_roots[withdrawal_position],
            branch,
            gindex: GindexCalculator::withdrawal_in_payload(withdrawal_position as u64),
            root: payload_root,
        };

        let (timestamp_branch, _) = prove_container_field(
            &payload_fields,
            PAYLOAD_TIMESTAMP_INDEX,
            ExecutionPayload::FIELD_COUNT,
        );
        let timestamp_proof = ProofComponent {
            leaf: payload_fields[PAYLOAD_TIMESTAMP_INDEX],
            branch: timestamp_branch,
            gindex: GindexCalculator::timestamp_in_payload(),
            root: payload_root,
        };

        Ok((payload_root, withdrawal_proof, timestamp_proof))
    }

    /// `block_roots[b]` of summary `s` against the oracle state root.
    fn prove_historical_block_root(
        state: &VersionedBeaconState,
        roots: &TopLevelRoots,
        block_roots_group: &[Root],
        params: &WithdrawalIndexParams,
        withdrawal_slot: u64,
        block_root: &Root,
    ) -> Result<ProofComponent, EngineError> {
        let summaries = state.historical_summaries();
        let summary_index = usize::try_from(params.historical_summary_index)
            .ok()
            .filter(|i| *i < summaries.len())
            .ok_or_else(|| EngineError::UnprovableRange {
                state_slot: roots.slot,
                withdrawal_slot,
                reason: format!(
                    "historical summary {} not in state ({} summaries)",
                    params.historical_summary_index,
                    summaries.len()
                ),
            })?;
        let summary = &summaries[summary_index];

        if block_roots_group.len() != preset::SLOTS_PER_HISTORICAL_ROOT {
            return Err(EngineError::Inconsistent(format!(
                "block roots group has {} entries, expected {}",
                block_roots_group.len(),
                preset::SLOTS_PER_HISTORICAL_ROOT
            )));
        }
        let block_root_index = params.block_root_index as usize;
        ensure_root(
            "block root in group",
            &block_roots_group[block_root_index],
            block_root,
        )?;

        // Layer 1: block_roots[b] within the snapshot vector
        let (mut branch, group_root) = prove_against_leaf_chunks(
            block_roots_group,
            block_root_index,
            preset::SLOTS_PER_HISTORICAL_ROOT_DEPTH,
        );
        ensure_root("block summary root", &group_root, &summary.block_summary_root)?;

        // Layer 2: block_summary_root within HistoricalSummary
        branch.push(summary.state_summary_root);

        // Layer 3: summaries[s] within the list, with length mix-in
        let summary_roots = element_roots(summaries)?;
        let (list_branch, summaries_root) =
            prove_list_element(&summary_roots, summary_index, preset::HISTORICAL_ROOTS_DEPTH);
        ensure_root(
            "historical summaries root",
            &summaries_root,
            &roots.field_roots[field::HISTORICAL_SUMMARIES],
        )?;
        branch.extend_from_slice(&list_branch);

        // Layer 4: historical_summaries within the state
        let depth = container_depth(roots.field_roots.len());
        let (state_branch, state_root) =
            prove_against_leaf_chunks(&roots.field_roots, field::HISTORICAL_SUMMARIES, depth);
        branch.extend_from_slice(&state_branch);

        Ok(ProofComponent {
            leaf: *block_root,
            branch,
            gindex: GindexCalculator::historical_block_root_in_state(
                depth,
                params.historical_summary_index,
                params.block_root_index,
            ),
            root: state_root,
        })
    }
}

impl ProofPrimitiveEngine for StateProver {
    fn compute_top_level_roots(
        &self,
        state: &VersionedBeaconState,
    ) -> Result<TopLevelRoots, EngineError> {
        let field_roots = state.field_roots().map_err(EngineError::merkleization)?;
        let state_root = merkle_root(&field_roots, state.tree_depth());
        Ok(TopLevelRoots {
            version: state.version(),
            slot: state.slot(),
            field_roots,
            state_root,
        })
    }

    fn prove_validator_against_state(
        &self,
        roots: &TopLevelRoots,
        slot: u64,
        validators: &[Validator],
        index: u64,
    ) -> Result<ValidatorProof, EngineError> {
        if roots.slot != slot {
            return Err(EngineError::Inconsistent(format!(
                "top-level roots are for slot {}, not {slot}",
                roots.slot
            )));
        }
        let position = check_index(index, validators.len())?;

        let validator_roots = element_roots(validators)?;
        let (mut branch, validators_root) = prove_list_element(
            &validator_roots,
            position,
            preset::VALIDATOR_REGISTRY_DEPTH,
        );
        ensure_root(
            "validators root",
            &validators_root,
            &roots.field_roots[field::VALIDATORS],
        )?;

        let depth = container_depth(roots.field_roots.len());
        let (state_branch, state_root) =
            prove_against_leaf_chunks(&roots.field_roots, field::VALIDATORS, depth);
        branch.extend_from_slice(&state_branch);

        Ok(ValidatorProof {
            fields: validators[position]
                .field_roots()
                .map_err(EngineError::merkleization)?,
            proof: ProofComponent {
                leaf: validator_roots[position],
                branch,
                gindex: GindexCalculator::validator_in_state(depth, index),
                root: state_root,
            },
        })
    }

    fn prove_validator_fields(
        &self,
        header: &BeaconBlockHeader,
        state: &VersionedBeaconState,
        index: u64,
    ) -> Result<ValidatorFieldsProof, EngineError> {
        check_index(index, state.validators().len())?;

        let roots = self.compute_top_level_roots(state)?;
        ensure_root("state root", &roots.state_root, &header.state_root)?;

        let state_root_proof = self.prove_state_root_against_header(header)?;
        let validator =
            self.prove_validator_against_state(&roots, state.slot(), state.validators(), index)?;

        Ok(ValidatorFieldsProof {
            state_root_proof,
            validator,
        })
    }

    fn prove_state_root_against_header(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<ProofComponent, EngineError> {
        Self::prove_header_field(header, "state_root", GindexCalculator::state_root_in_header())
    }

    fn prove_slot_against_header(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<ProofComponent, EngineError> {
        Self::prove_header_field(header, "slot", GindexCalculator::slot_in_header())
    }

    fn prove_withdrawal(
        &self,
        header: &BeaconBlockHeader,
        state: &VersionedBeaconState,
        roots: &TopLevelRoots,
        block_roots_group: &[Root],
        block: &VersionedSignedBeaconBlock,
        validator_index: u64,
    ) -> Result<WithdrawalProofComponents, EngineError> {
        ensure_root("state root", &roots.state_root, &header.state_root)?;
        let params = self.resolve_withdrawal_index_params(header.slot, block.slot())?;

        let payload = block.execution_payload();
        let withdrawal_position = payload
            .withdrawals
            .iter()
            .position(|w| w.validator_index == validator_index)
            .ok_or(EngineError::WithdrawalNotFound {
                validator_index,
                slot: block.slot(),
            })?;

        // Withdrawal block header, rebuilt from the block
        let block_header = block.header().map_err(EngineError::merkleization)?;
        let header_fields = header_field_roots(&block_header);
        let block_root = merkle_root(&header_fields, container_depth(HEADER_FIELD_COUNT));

        let historical_summary_block_root_proof =
            Self::prove_historical_block_root(
            state,
            roots,
            block_roots_group,
            &params,
            block.slot(),
            &block_root,
        )?;

        let (payload_root, withdrawal_proof, timestamp_proof) =
            Self::prove_payload_fields(payload, withdrawal_position)?;

        // execution_payload within body, then body_root within header
        let body_fields = block.body_field_roots().map_err(EngineError::merkleization)?;
        let (mut payload_branch, body_root) =
            prove_container_field(&body_fields, EXECUTION_PAYLOAD_INDEX, block.body_field_count());
        ensure_root("body root", &body_root, &block_header.body_root)?;
        let (header_branch, _) =
            prove_container_field(&header_fields, BODY_ROOT_INDEX, HEADER_FIELD_COUNT);
        payload_branch.extend_from_slice(&header_branch);

        let execution_payload_proof = ProofComponent {
            leaf: payload_root,
            branch: payload_branch,
            gindex: GindexCalculator::execution_payload_in_block(),
            root: block_root,
        };

        Ok(WithdrawalProofComponents {
            withdrawal_index: withdrawal_position as u64,
            withdrawal_fields: payload.withdrawals[withdrawal_position]
                .field_roots()
                .map_err(EngineError::merkleization)?,
            withdrawal_proof,
            slot_root: header_fields[0],
            timestamp_proof,
            execution_payload_proof,
            historical_summary_block_root_proof,
            index_params: params,
        })
    }

    fn resolve_withdrawal_index_params(
        &self,
        state_slot: u64,
        withdrawal_slot: u64,
    ) -> Result<WithdrawalIndexParams, EngineError> {
        withdrawal_index_params(&self.spec, state_slot, withdrawal_slot)
    }
}
