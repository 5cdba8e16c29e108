//! Generalized Index Computation
//!
//! Computes generalized indices (gindices) for the proofs we emit. A gindex
//! both locates the leaf and fixes the proof length (`gindex_depth`), which
//! is what a verifier hardcodes.
//!
//! State-anchored gindices take the state tree depth as a parameter because
//! Deneb (28 fields) and Electra (37 fields) differ by one level.

use crate::beacon_block::{BODY_ROOT_INDEX, EXECUTION_PAYLOAD_INDEX};
use crate::beacon_state::field;
use crate::types::preset;

/// Calculator for generalized indices in header, state, body and payload trees
#[derive(Debug, Clone, Copy)]
pub struct GindexCalculator;

impl GindexCalculator {
    // BeaconBlockHeader has 5 fields, tree depth 3
    const HEADER_BASE_GINDEX: u64 = 8;
    const HEADER_SLOT_FIELD_INDEX: u64 = 0;
    const HEADER_STATE_ROOT_FIELD_INDEX: u64 = 3;

    // BeaconBlockBody has 12 (Deneb) or 13 (Electra) fields, tree depth 4
    const BODY_BASE_GINDEX: u64 = 16;

    // ExecutionPayload has 17 fields, tree depth 5
    const PAYLOAD_BASE_GINDEX: u64 = 32;
    const PAYLOAD_TIMESTAMP_FIELD_INDEX: u64 = 9;
    const PAYLOAD_WITHDRAWALS_FIELD_INDEX: u64 = 14;

    // HistoricalSummary has 2 fields; block_summary_root is the left one
    const SUMMARY_BLOCK_ROOT_GINDEX: u64 = 2;

    // Left child of a list root holds the data tree, right child the length
    const LIST_DATA_GINDEX: u64 = 2;

    /// `state_root` within a block header
    #[must_use]
    pub const fn state_root_in_header() -> u64 {
        Self::HEADER_BASE_GINDEX + Self::HEADER_STATE_ROOT_FIELD_INDEX
    }

    /// `slot` within a block header
    #[must_use]
    pub const fn slot_in_header() -> u64 {
        Self::HEADER_BASE_GINDEX + Self::HEADER_SLOT_FIELD_INDEX
    }

    /// `body.execution_payload` from a block root
    #[must_use]
    pub fn execution_payload_in_block() -> u64 {
        Self::concat_gindices(&[
            Self::HEADER_BASE_GINDEX + BODY_ROOT_INDEX as u64,
            Self::BODY_BASE_GINDEX + EXECUTION_PAYLOAD_INDEX as u64,
        ])
    }

    /// `timestamp` within an execution payload
    #[must_use]
    pub const fn timestamp_in_payload() -> u64 {
        Self::PAYLOAD_BASE_GINDEX + Self::PAYLOAD_TIMESTAMP_FIELD_INDEX
    }

    /// `withdrawals[i]` within an execution payload
    #[must_use]
    pub fn withdrawal_in_payload(withdrawal_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::PAYLOAD_BASE_GINDEX + Self::PAYLOAD_WITHDRAWALS_FIELD_INDEX,
            Self::LIST_DATA_GINDEX,
            (1_u64 << preset::WITHDRAWALS_DEPTH) + withdrawal_index,
        ])
    }

    /// `validators[i]` within a state of tree depth `state_depth`
    #[must_use]
    pub fn validator_in_state(state_depth: u32, validator_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::state_field(state_depth, field::VALIDATORS),
            Self::LIST_DATA_GINDEX,
            (1_u64 << preset::VALIDATOR_REGISTRY_DEPTH) + validator_index,
        ])
    }

    /// `historical_summaries[s].block_summary_root` → `block_roots[b]` within
    /// a state of tree depth `state_depth`
    #[must_use]
    pub fn historical_block_root_in_state(
        state_depth: u32,
        summary_index: u64,
        block_root_index: u64,
    ) -> u64 {
        Self::concat_gindices(&[
            Self::state_field(state_depth, field::HISTORICAL_SUMMARIES),
            Self::LIST_DATA_GINDEX,
            (1_u64 << preset::HISTORICAL_ROOTS_DEPTH) + summary_index,
            Self::SUMMARY_BLOCK_ROOT_GINDEX,
            (1_u64 << preset::SLOTS_PER_HISTORICAL_ROOT_DEPTH) + block_root_index,
        ])
    }

    const fn state_field(state_depth: u32, field_index: usize) -> u64 {
        (1_u64 << state_depth) + field_index as u64
    }

    /// Concatenate generalized indices along a path
    ///
    /// Given a sequence of gindices representing a path through nested structures,
    /// compute the final gindex from the outermost root.
    #[must_use]
    pub fn concat_gindices(gindices: &[u64]) -> u64 {
        let mut result = 1_u64; // Start at root

        for &gindex in gindices {
            let depth = Self::gindex_depth(gindex);
            result = (result << depth) | (gindex ^ (1_u64 << depth));
        }

        result
    }

    /// Compute the depth (number of proof elements) for a given gindex
    #[must_use]
    pub const fn gindex_depth(gindex: u64) -> u32 {
        63 - gindex.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DENEB_STATE_DEPTH: u32 = 5;
    const ELECTRA_STATE_DEPTH: u32 = 6;

    #[test]
    fn test_concat_gindices() {
        assert_eq!(GindexCalculator::concat_gindices(&[11]), 11);
        assert_eq!(GindexCalculator::concat_gindices(&[2, 2]), 4);
        assert_eq!(GindexCalculator::concat_gindices(&[2, 3]), 5);
        // header.body_root (12) then body.execution_payload (25)
        assert_eq!(GindexCalculator::execution_payload_in_block(), 12 * 16 + 9);
    }

    #[test]
    fn test_gindex_depth() {
        assert_eq!(GindexCalculator::gindex_depth(1), 0);
        assert_eq!(GindexCalculator::gindex_depth(3), 1);
        assert_eq!(GindexCalculator::gindex_depth(8), 3);
        assert_eq!(GindexCalculator::gindex_depth(11), 3);
    }

    #[test]
    fn test_header_gindices() {
        assert_eq!(GindexCalculator::state_root_in_header(), 11);
        assert_eq!(GindexCalculator::slot_in_header(), 8);
    }

    #[test]
    fn test_proof_lengths_deneb() {
        let depth = GindexCalculator::gindex_depth;
        // 5 (state) + 1 (list) + 40 (registry)
        assert_eq!(depth(GindexCalculator::validator_in_state(DENEB_STATE_DEPTH, 0)), 46);
        // 5 (state) + 1 (list) + 24 (summaries) + 1 (summary) + 13 (block roots)
        assert_eq!(
            depth(GindexCalculator::historical_block_root_in_state(DENEB_STATE_DEPTH, 0, 0)),
            44
        );
        // 5 (payload) + 1 (list) + 4 (withdrawals)
        assert_eq!(depth(GindexCalculator::withdrawal_in_payload(0)), 10);
        assert_eq!(depth(GindexCalculator::timestamp_in_payload()), 5);
        assert_eq!(depth(GindexCalculator::execution_payload_in_block()), 7);
    }

    #[test]
    fn test_proof_lengths_electra() {
        let depth = GindexCalculator::gindex_depth;
        assert_eq!(depth(GindexCalculator::validator_in_state(ELECTRA_STATE_DEPTH, 0)), 47);
        assert_eq!(
            depth(GindexCalculator::historical_block_root_in_state(ELECTRA_STATE_DEPTH, 0, 0)),
            45
        );
    }

    #[test]
    fn test_validator_gindex_encodes_index() {
        let base = GindexCalculator::validator_in_state(DENEB_STATE_DEPTH, 0);
        assert_eq!(GindexCalculator::validator_in_state(DENEB_STATE_DEPTH, 1_647_525), base + 1_647_525);
        // state field 11 at depth 5, then list data (left), then 2^40 leaves
        assert_eq!(base, ((32 + 11) * 2) << 40);
    }
}
