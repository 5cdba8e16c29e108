//! End-to-end proof requests against an in-memory chain, proven by the
//! sparse `StateProver` and verified with ssz_rs.

use proof_gen::beacon_block::{DenebSignedBeaconBlock, ElectraSignedBeaconBlock};
use proof_gen::beacon_state::{DenebBeaconState, ElectraBeaconState};
use proof_gen::{
    u64_chunk, BeaconBlockHeader, BeaconClientError, ChainDataSource, ChainSpec, GindexCalculator,
    HistoricalSummary, ProofErrorKind, ProofOrchestrator, Root, StateProver, Validator,
    VersionedBeaconState, VersionedSignedBeaconBlock, Withdrawal,
};
use ssz_rs::prelude::*;
use ssz_rs::HashTreeRoot;
use std::collections::HashMap;
use std::sync::Arc;

const ORACLE_SLOT: u64 = 16_400;
const GROUP_SLOT: u64 = 16_384;
const WITHDRAWAL_SLOT: u64 = 8_200;
const VALIDATOR_COUNT: u8 = 6;

#[derive(Default)]
struct InMemoryChain {
    headers: HashMap<u64, BeaconBlockHeader>,
    states: HashMap<u64, VersionedBeaconState>,
    blocks: HashMap<u64, VersionedSignedBeaconBlock>,
}

impl ChainDataSource for InMemoryChain {
    async fn block_header(&self, slot: u64) -> Result<BeaconBlockHeader, BeaconClientError> {
        self.headers
            .get(&slot)
            .cloned()
            .ok_or(BeaconClientError::HeaderNotFound(slot))
    }

    async fn beacon_state(&self, slot: u64) -> Result<VersionedBeaconState, BeaconClientError> {
        self.states
            .get(&slot)
            .cloned()
            .ok_or(BeaconClientError::StateNotFound(slot))
    }

    async fn signed_block(
        &self,
        slot: u64,
    ) -> Result<VersionedSignedBeaconBlock, BeaconClientError> {
        self.blocks
            .get(&slot)
            .cloned()
            .ok_or(BeaconClientError::BlockNotFound(slot))
    }
}

fn validator(i: u8) -> Validator {
    let mut v = Validator::default();
    v.withdrawal_credentials[0] = 0x01;
    v.withdrawal_credentials[31] = i;
    v.effective_balance = 32_000_000_000;
    v.activation_epoch = u64::from(i);
    v.exit_epoch = u64::MAX;
    v.withdrawable_epoch = u64::MAX;
    v
}

fn header_for(slot: u64, state_root: Root) -> BeaconBlockHeader {
    BeaconBlockHeader {
        slot,
        proposer_index: 1,
        parent_root: [0x0a; 32],
        state_root,
        body_root: [0x0b; 32],
    }
}

fn withdrawal_block() -> VersionedSignedBeaconBlock {
    let mut block = DenebSignedBeaconBlock::default();
    block.message.slot = WITHDRAWAL_SLOT;
    block.message.proposer_index = 2;
    block.message.body.execution_payload.block_number = 777;
    block.message.body.execution_payload.timestamp = 1_700_000_000;
    for (i, validator_index) in [5u64, 3, 1].into_iter().enumerate() {
        block.message.body.execution_payload.withdrawals.push(Withdrawal {
            index: 40 + i as u64,
            validator_index,
            address: [0xee; 20],
            amount: 1_000_000 * (i as u64 + 1),
        });
    }
    VersionedSignedBeaconBlock::from(block)
}

/// Deneb chain, Capella at genesis: the oracle state at 16400 carries two
/// historical summaries; the second snapshots the block roots of the state
/// at 16384, which include the withdrawal block at 8200.
fn chain() -> InMemoryChain {
    let block = withdrawal_block();
    let block_root = block.block_root().unwrap();

    let mut group_state = DenebBeaconState::default();
    group_state.slot = GROUP_SLOT;
    for i in 0..8192usize {
        group_state.block_roots[i] = [(i % 251) as u8; 32];
    }
    group_state.block_roots[(WITHDRAWAL_SLOT % 8192) as usize] = block_root;
    let group_root: Root = group_state.block_roots.hash_tree_root().unwrap().into();

    let mut oracle = DenebBeaconState::default();
    oracle.slot = ORACLE_SLOT;
    for i in 0..VALIDATOR_COUNT {
        oracle.validators.push(validator(i));
        oracle.balances.push(32_000_000_000);
    }
    oracle.historical_summaries.push(HistoricalSummary {
        block_summary_root: [0x31; 32],
        state_summary_root: [0x32; 32],
    });
    oracle.historical_summaries.push(HistoricalSummary {
        block_summary_root: group_root,
        state_summary_root: [0x33; 32],
    });
    let oracle_root: Root = oracle.hash_tree_root().unwrap().into();

    let mut electra = ElectraBeaconState::default();
    electra.slot = 20_000;
    for i in 0..VALIDATOR_COUNT {
        electra.validators.push(validator(i));
    }
    let electra_root: Root = electra.hash_tree_root().unwrap().into();

    let mut chain = InMemoryChain::default();
    chain.headers.insert(ORACLE_SLOT, header_for(ORACLE_SLOT, oracle_root));
    chain.states.insert(ORACLE_SLOT, VersionedBeaconState::from(oracle));
    chain.states.insert(GROUP_SLOT, VersionedBeaconState::from(group_state));
    chain.blocks.insert(WITHDRAWAL_SLOT, block);
    chain.headers.insert(20_000, header_for(20_000, electra_root));
    chain.states.insert(20_000, VersionedBeaconState::from(electra));
    chain
}

fn orchestrator() -> ProofOrchestrator<InMemoryChain, StateProver> {
    let spec = ChainSpec::custom(1337, 0).unwrap();
    ProofOrchestrator::new(Arc::new(chain()), Arc::new(StateProver::new(spec)))
}

fn node(bytes: &Root) -> Node {
    Node::try_from(bytes.as_slice()).unwrap()
}

fn assert_branch(leaf: &Root, branch: &[Root], gindex: u64, root: &Root) {
    assert_eq!(
        branch.len() as u32,
        GindexCalculator::gindex_depth(gindex),
        "branch length for gindex {gindex}"
    );
    let branch: Vec<Node> = branch.iter().map(node).collect();
    ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
        node(leaf),
        &branch,
        gindex as usize,
        node(root),
    )
    .unwrap_or_else(|e| panic!("branch for gindex {gindex} does not verify: {e:?}"));
}

#[tokio::test]
async fn validator_proof_chains_to_header() {
    let orch = orchestrator();
    let chain = orch.source();
    let header = chain.headers[&ORACLE_SLOT].clone();
    let header_root: Root = header.hash_tree_root().unwrap().into();

    let bundle = orch.get_validator_proof(ORACLE_SLOT, 4).await.unwrap();

    assert_eq!(bundle.state_root, header.state_root);
    assert_eq!(bundle.state_root_proof.len(), 3);
    assert_branch(
        &bundle.state_root,
        &bundle.state_root_proof,
        GindexCalculator::state_root_in_header(),
        &header_root,
    );

    assert_eq!(bundle.validator_fields, validator(4).field_roots().unwrap());
    let validator_root: Root = validator(4).hash_tree_root().unwrap().into();
    assert_eq!(bundle.validator_proof.len(), 46);
    assert_branch(
        &validator_root,
        &bundle.validator_proof,
        GindexCalculator::validator_in_state(5, 4),
        &bundle.state_root,
    );
}

#[tokio::test]
async fn validator_proof_electra_state() {
    let orch = orchestrator();
    let bundle = orch.get_validator_proof(20_000, 0).await.unwrap();

    let validator_root: Root = validator(0).hash_tree_root().unwrap().into();
    assert_eq!(bundle.validator_proof.len(), 47);
    assert_branch(
        &validator_root,
        &bundle.validator_proof,
        GindexCalculator::validator_in_state(6, 0),
        &bundle.state_root,
    );
}

#[tokio::test]
async fn withdrawal_proof_chains_to_state_root() {
    let orch = orchestrator();
    let chain = orch.source();
    let oracle_header = chain.headers[&ORACLE_SLOT].clone();
    let oracle_header_root: Root = oracle_header.hash_tree_root().unwrap().into();
    let block = chain.blocks[&WITHDRAWAL_SLOT].clone();

    let bundle = orch
        .get_withdrawal_proof(ORACLE_SLOT, WITHDRAWAL_SLOT, 3)
        .await
        .unwrap();

    assert_eq!(bundle.historical_summary_index, 1);
    assert_eq!(bundle.block_root_index, 8);
    assert_eq!(bundle.withdrawal_index_within_block, 1);

    // oracle header
    assert_eq!(bundle.state_root, oracle_header.state_root);
    assert_branch(
        &bundle.state_root,
        &bundle.state_root_proof,
        GindexCalculator::state_root_in_header(),
        &oracle_header_root,
    );
    assert_branch(
        &u64_chunk(ORACLE_SLOT),
        &bundle.slot_root_proof,
        GindexCalculator::slot_in_header(),
        &oracle_header_root,
    );
    assert_eq!(bundle.slot_root, u64_chunk(WITHDRAWAL_SLOT));

    // validator in oracle state
    let validator_root: Root = validator(3).hash_tree_root().unwrap().into();
    assert_branch(
        &validator_root,
        &bundle.validator_proof,
        GindexCalculator::validator_in_state(5, 3),
        &bundle.state_root,
    );

    // withdrawal block root via historical summaries
    assert_eq!(bundle.historical_summary_block_root, block.block_root().unwrap());
    assert_eq!(bundle.historical_summary_block_root_proof.len(), 44);
    assert_branch(
        &bundle.historical_summary_block_root,
        &bundle.historical_summary_block_root_proof,
        GindexCalculator::historical_block_root_in_state(5, 1, 8),
        &bundle.state_root,
    );

    // payload in block, timestamp and withdrawal in payload
    let payload = block.execution_payload();
    let payload_root: Root = payload.hash_tree_root().unwrap().into();
    assert_eq!(bundle.execution_payload_root, payload_root);
    assert_branch(
        &bundle.execution_payload_root,
        &bundle.execution_payload_root_proof,
        GindexCalculator::execution_payload_in_block(),
        &bundle.historical_summary_block_root,
    );
    assert_eq!(bundle.timestamp_root, u64_chunk(1_700_000_000));
    assert_branch(
        &bundle.timestamp_root,
        &bundle.timestamp_root_proof,
        GindexCalculator::timestamp_in_payload(),
        &bundle.execution_payload_root,
    );
    let withdrawal = &payload.withdrawals[1];
    let withdrawal_root: Root = withdrawal.hash_tree_root().unwrap().into();
    assert_eq!(bundle.withdrawal_fields, withdrawal.field_roots().unwrap());
    assert_branch(
        &withdrawal_root,
        &bundle.withdrawal_proof,
        GindexCalculator::withdrawal_in_payload(1),
        &bundle.execution_payload_root,
    );
}

const ELECTRA_ORACLE_SLOT: u64 = 40_976;
const ELECTRA_GROUP_SLOT: u64 = 40_960;
const ELECTRA_WITHDRAWAL_SLOT: u64 = 32_800;

/// Electra-only chain: the withdrawal at 32800 lands in summary 4, written
/// by the state at 40960 and carried by the oracle state at 40976.
fn electra_orchestrator() -> ProofOrchestrator<InMemoryChain, StateProver> {
    let mut block = ElectraSignedBeaconBlock::default();
    block.message.slot = ELECTRA_WITHDRAWAL_SLOT;
    block.message.proposer_index = 9;
    block.message.body.execution_payload.timestamp = 1_750_000_000;
    for (i, validator_index) in [2u64, 4].into_iter().enumerate() {
        block.message.body.execution_payload.withdrawals.push(Withdrawal {
            index: 900 + i as u64,
            validator_index,
            address: [0xdd; 20],
            amount: 2_000_000,
        });
    }
    let block = VersionedSignedBeaconBlock::from(block);
    let block_root = block.block_root().unwrap();

    let mut group_state = ElectraBeaconState::default();
    group_state.slot = ELECTRA_GROUP_SLOT;
    for i in 0..8192usize {
        group_state.block_roots[i] = [(i % 239) as u8; 32];
    }
    group_state.block_roots[(ELECTRA_WITHDRAWAL_SLOT % 8192) as usize] = block_root;
    let group_root: Root = group_state.block_roots.hash_tree_root().unwrap().into();

    let mut oracle = ElectraBeaconState::default();
    oracle.slot = ELECTRA_ORACLE_SLOT;
    for i in 0..VALIDATOR_COUNT {
        oracle.validators.push(validator(i));
        oracle.balances.push(32_000_000_000);
    }
    for i in 0..4u8 {
        oracle.historical_summaries.push(HistoricalSummary {
            block_summary_root: [0x40 + i; 32],
            state_summary_root: [0x50 + i; 32],
        });
    }
    oracle.historical_summaries.push(HistoricalSummary {
        block_summary_root: group_root,
        state_summary_root: [0x54; 32],
    });
    let oracle_root: Root = oracle.hash_tree_root().unwrap().into();

    let mut chain = InMemoryChain::default();
    chain
        .headers
        .insert(ELECTRA_ORACLE_SLOT, header_for(ELECTRA_ORACLE_SLOT, oracle_root));
    chain
        .states
        .insert(ELECTRA_ORACLE_SLOT, VersionedBeaconState::from(oracle));
    chain
        .states
        .insert(ELECTRA_GROUP_SLOT, VersionedBeaconState::from(group_state));
    chain.blocks.insert(ELECTRA_WITHDRAWAL_SLOT, block);

    let spec = ChainSpec::custom(1337, 0).unwrap();
    ProofOrchestrator::new(Arc::new(chain), Arc::new(StateProver::new(spec)))
}

#[tokio::test]
async fn electra_withdrawal_proof_chains_to_state_root() {
    let orch = electra_orchestrator();
    let chain = orch.source();
    let oracle_header = chain.headers[&ELECTRA_ORACLE_SLOT].clone();
    let oracle_header_root: Root = oracle_header.hash_tree_root().unwrap().into();
    let block = chain.blocks[&ELECTRA_WITHDRAWAL_SLOT].clone();

    let bundle = orch
        .get_withdrawal_proof(ELECTRA_ORACLE_SLOT, ELECTRA_WITHDRAWAL_SLOT, 4)
        .await
        .unwrap();

    assert_eq!(bundle.historical_summary_index, 4);
    assert_eq!(bundle.block_root_index, 32);
    assert_eq!(bundle.withdrawal_index_within_block, 1);

    assert_eq!(bundle.state_root, oracle_header.state_root);
    assert_branch(
        &bundle.state_root,
        &bundle.state_root_proof,
        GindexCalculator::state_root_in_header(),
        &oracle_header_root,
    );
    assert_branch(
        &u64_chunk(ELECTRA_ORACLE_SLOT),
        &bundle.slot_root_proof,
        GindexCalculator::slot_in_header(),
        &oracle_header_root,
    );
    assert_eq!(bundle.slot_root, u64_chunk(ELECTRA_WITHDRAWAL_SLOT));

    let validator_root: Root = validator(4).hash_tree_root().unwrap().into();
    assert_eq!(bundle.validator_proof.len(), 47);
    assert_branch(
        &validator_root,
        &bundle.validator_proof,
        GindexCalculator::validator_in_state(6, 4),
        &bundle.state_root,
    );

    assert_eq!(bundle.historical_summary_block_root, block.block_root().unwrap());
    assert_eq!(bundle.historical_summary_block_root_proof.len(), 45);
    assert_branch(
        &bundle.historical_summary_block_root,
        &bundle.historical_summary_block_root_proof,
        GindexCalculator::historical_block_root_in_state(6, 4, 32),
        &bundle.state_root,
    );

    let payload = block.execution_payload();
    let payload_root: Root = payload.hash_tree_root().unwrap().into();
    assert_eq!(bundle.execution_payload_root, payload_root);
    assert_branch(
        &bundle.execution_payload_root,
        &bundle.execution_payload_root_proof,
        GindexCalculator::execution_payload_in_block(),
        &bundle.historical_summary_block_root,
    );
    assert_eq!(bundle.timestamp_root, u64_chunk(1_750_000_000));
    assert_branch(
        &bundle.timestamp_root,
        &bundle.timestamp_root_proof,
        GindexCalculator::timestamp_in_payload(),
        &bundle.execution_payload_root,
    );
    let withdrawal = &payload.withdrawals[1];
    let withdrawal_root: Root = withdrawal.hash_tree_root().unwrap().into();
    assert_eq!(bundle.withdrawal_fields, withdrawal.field_roots().unwrap());
    assert_branch(
        &withdrawal_root,
        &bundle.withdrawal_proof,
        GindexCalculator::withdrawal_in_payload(1),
        &bundle.execution_payload_root,
    );
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let orch = orchestrator();
    let first = orch
        .get_withdrawal_proof(ORACLE_SLOT, WITHDRAWAL_SLOT, 5)
        .await
        .unwrap();
    let second = orch
        .get_withdrawal_proof(ORACLE_SLOT, WITHDRAWAL_SLOT, 5)
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[tokio::test]
async fn withdrawal_after_state_slot_is_unprovable() {
    let err = orchestrator()
        .get_withdrawal_proof(WITHDRAWAL_SLOT, ORACLE_SLOT, 3)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::UnprovableRange);
}

#[tokio::test]
async fn withdrawal_summary_not_yet_written_is_unprovable() {
    // group slot 16384 is after the state at 16383
    let err = orchestrator()
        .get_withdrawal_proof(16_383, WITHDRAWAL_SLOT, 3)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::UnprovableRange);
}

#[tokio::test]
async fn validator_without_withdrawal_is_reported() {
    let err = orchestrator()
        .get_withdrawal_proof(ORACLE_SLOT, WITHDRAWAL_SLOT, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::WithdrawalNotFound);
}

#[tokio::test]
async fn validator_index_at_registry_size_is_out_of_range() {
    let orch = orchestrator();
    let err = orch
        .get_validator_proof(ORACLE_SLOT, u64::from(VALIDATOR_COUNT))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::IndexOutOfRange);

    let err = orch
        .get_withdrawal_proof(ORACLE_SLOT, WITHDRAWAL_SLOT, u64::from(VALIDATOR_COUNT) + 10)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::IndexOutOfRange);
}

#[tokio::test]
async fn slot_beyond_head_is_data_unavailable() {
    let err = orchestrator()
        .get_validator_proof(99_999_999, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ProofErrorKind::DataUnavailable);
    assert!(err.is_not_found());
}
