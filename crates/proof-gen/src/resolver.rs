//! Withdrawal index resolution
//!
//! Thin wrapper over the engine's index arithmetic that classifies failures
//! for callers and rejects parameter sets a later fetch could not use.

use crate::engine::{EngineError, ProofPrimitiveEngine, WithdrawalIndexParams};
use crate::proof::ProofError;
use crate::types::preset;
use std::sync::Arc;

/// Resolves `(state_slot, withdrawal_slot)` to historical summary coordinates.
#[derive(Debug)]
pub struct WithdrawalIndexResolver<E> {
    engine: Arc<E>,
}

impl<E> Clone for WithdrawalIndexResolver<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<E: ProofPrimitiveEngine> WithdrawalIndexResolver<E> {
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self { engine }
    }

    /// # Errors
    /// `UnprovableRange` when the withdrawal is not reachable from the state
    /// slot; `PrimitiveFailure` if the engine returns unusable parameters.
    pub fn resolve(
        &self,
        state_slot: u64,
        withdrawal_slot: u64,
    ) -> Result<WithdrawalIndexParams, ProofError> {
        if withdrawal_slot > state_slot {
            return Err(ProofError::UnprovableRange {
                state_slot,
                withdrawal_slot,
                reason: "withdrawal slot is after state slot".into(),
            });
        }

        let params = self
            .engine
            .resolve_withdrawal_index_params(state_slot, withdrawal_slot)
            .map_err(|err| match err {
                EngineError::UnprovableRange { .. } => ProofError::from(err),
                other => ProofError::PrimitiveFailure(other.to_string()),
            })?;

        let usable = params.block_root_index < preset::SLOTS_PER_HISTORICAL_ROOT as u64
            && params.group_slot > withdrawal_slot
            && params.group_slot <= state_slot;
        if !usable {
            return Err(ProofError::PrimitiveFailure(format!(
                "engine resolved unusable withdrawal index params {params:?} \
                 for state slot {state_slot}, withdrawal slot {withdrawal_slot}"
            )));
        }

        Ok(params)
    }
}
