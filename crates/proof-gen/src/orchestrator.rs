//! Proof Orchestrator
//!
//! Sequences fetches from a [`ChainDataSource`] and calls into a
//! [`ProofPrimitiveEngine`] to answer the two proof queries:
//!
//! - `get_validator_proof`: header + state at one slot, then one primitive.
//! - `get_withdrawal_proof`: resolve the group slot, fetch the oracle
//!   header, oracle state, withdrawal block and group state concurrently,
//!   then run the primitives and assemble the bundle.
//!
//! The orchestrator holds no per-request state. Errors short-circuit the
//! pipeline; concurrent fetches are dropped on the first failure. Blocking
//! work cannot be aborted mid-primitive: a dropped request stops it at the
//! next stage boundary, and an SSZ decode already running in the data source
//! finishes before its result is discarded.

use crate::beacon_block::VersionedSignedBeaconBlock;
use crate::beacon_client::{BeaconClientError, ChainDataSource};
use crate::beacon_state::VersionedBeaconState;
use crate::engine::{ProofPrimitiveEngine, WithdrawalIndexParams};
use crate::proof::{ProofError, ProofErrorKind, ValidatorProofBundle, WithdrawalProofBundle};
use crate::resolver::WithdrawalIndexResolver;
use crate::types::{BeaconBlockHeader, Root};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Answers validator and withdrawal proof requests.
pub struct ProofOrchestrator<S, E> {
    source: Arc<S>,
    engine: Arc<E>,
    resolver: WithdrawalIndexResolver<E>,
    timeout: Option<Duration>,
}

impl<S, E> Clone for ProofOrchestrator<S, E> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            engine: Arc::clone(&self.engine),
            resolver: self.resolver.clone(),
            timeout: self.timeout,
        }
    }
}

/// Fetched inputs of the withdrawal primitives
struct WithdrawalInputs {
    header: BeaconBlockHeader,
    state: VersionedBeaconState,
    block: VersionedSignedBeaconBlock,
    block_roots_group: Vec<Root>,
}

impl<S: ChainDataSource, E: ProofPrimitiveEngine> ProofOrchestrator<S, E> {
    pub fn new(source: Arc<S>, engine: Arc<E>) -> Self {
        let resolver = WithdrawalIndexResolver::new(Arc::clone(&engine));
        Self {
            source,
            engine,
            resolver,
            timeout: None,
        }
    }

    /// Bound every request by `timeout`; expiry cancels in-flight fetches.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Prove `validator_index`'s record in the state at `slot`.
    ///
    /// # Errors
    /// Returns the first fetch or primitive failure; no partial bundle.
    #[instrument(skip(self))]
    pub async fn get_validator_proof(
        &self,
        slot: u64,
        validator_index: u64,
    ) -> Result<ValidatorProofBundle, ProofError> {
        let result = self
            .with_deadline(self.validator_pipeline(slot, validator_index))
            .await;
        log_outcome("validator", &result);
        result
    }

    /// Prove `validator_index`'s withdrawal in the block at
    /// `withdrawal_slot`, anchored to the state at `state_slot`.
    ///
    /// # Errors
    /// `UnprovableRange` when the withdrawal slot cannot be reached from the
    /// state slot; otherwise the first fetch or primitive failure.
    #[instrument(skip(self))]
    pub async fn get_withdrawal_proof(
        &self,
        state_slot: u64,
        withdrawal_slot: u64,
        validator_index: u64,
    ) -> Result<WithdrawalProofBundle, ProofError> {
        let result = self
            .with_deadline(self.withdrawal_pipeline(state_slot, withdrawal_slot, validator_index))
            .await;
        log_outcome("withdrawal", &result);
        result
    }

    async fn validator_pipeline(
        &self,
        slot: u64,
        validator_index: u64,
    ) -> Result<ValidatorProofBundle, ProofError> {
        debug!(slot, "Fetching header and state");
        let (header, state) = tokio::try_join!(
            self.source.block_header(slot),
            self.source.beacon_state(slot),
        )?;
        debug!(version = %state.version(), validators = state.validators().len(), "Fetched state");

        let engine = Arc::clone(&self.engine);
        let proof = run_blocking("validator proof", move |cancel| {
            cancel.check("validator proof")?;
            engine
                .prove_validator_fields(&header, &state, validator_index)
                .map_err(ProofError::from)
        })
        .await?;

        Ok(ValidatorProofBundle {
            state_root: proof.state_root_proof.leaf,
            state_root_proof: proof.state_root_proof.branch,
            validator_fields: proof.validator.fields,
            validator_proof: proof.validator.proof.branch,
        })
    }

    async fn withdrawal_pipeline(
        &self,
        state_slot: u64,
        withdrawal_slot: u64,
        validator_index: u64,
    ) -> Result<WithdrawalProofBundle, ProofError> {
        let params = self.resolver.resolve(state_slot, withdrawal_slot)?;
        debug!(
            historical_summary_index = params.historical_summary_index,
            block_root_index = params.block_root_index,
            group_slot = params.group_slot,
            "Resolved withdrawal index params"
        );

        let (header, state, block, block_roots_group) = tokio::try_join!(
            self.source.block_header(state_slot),
            self.source.beacon_state(state_slot),
            self.source.signed_block(withdrawal_slot),
            async {
                let group_state = self.source.beacon_state(params.group_slot).await?;
                Ok::<_, BeaconClientError>(group_state.block_roots().to_vec())
            },
        )?;
        debug!(
            version = %state.version(),
            block_version = %block.version(),
            "Fetched oracle state, withdrawal block and block roots group"
        );

        let inputs = WithdrawalInputs {
            header,
            state,
            block,
            block_roots_group,
        };
        let engine = Arc::clone(&self.engine);
        run_blocking("withdrawal proof", move |cancel| {
            prove_withdrawal_bundle(engine.as_ref(), &inputs, validator_index, params, cancel)
        })
        .await
    }

    async fn with_deadline<T>(
        &self,
        pipeline: impl Future<Output = Result<T, ProofError>>,
    ) -> Result<T, ProofError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pipeline)
                .await
                .map_err(|_| ProofError::Timeout(limit))?,
            None => pipeline.await,
        }
    }
}

/// Runs every withdrawal primitive and assembles the bundle.
fn prove_withdrawal_bundle<E: ProofPrimitiveEngine>(
    engine: &E,
    inputs: &WithdrawalInputs,
    validator_index: u64,
    params: WithdrawalIndexParams,
    cancel: &Cancellation,
) -> Result<WithdrawalProofBundle, ProofError> {
    let WithdrawalInputs {
        header,
        state,
        block,
        block_roots_group,
    } = inputs;

    cancel.check("top level roots")?;
    let roots = engine.compute_top_level_roots(state)?;
    cancel.check("validator proof")?;
    let validator =
        engine.prove_validator_against_state(&roots, state.slot(), state.validators(), validator_index)?;
    let state_root_proof = engine.prove_state_root_against_header(header)?;
    let slot_proof = engine.prove_slot_against_header(header)?;
    cancel.check("withdrawal proof")?;
    let withdrawal = engine.prove_withdrawal(
        header,
        state,
        &roots,
        block_roots_group,
        block,
        validator_index,
    )?;

    let withdrawal_count = block.execution_payload().withdrawals.len();
    if withdrawal.withdrawal_index >= withdrawal_count as u64 {
        return Err(ProofError::PrimitiveFailure(format!(
            "withdrawal index {} outside payload with {withdrawal_count} withdrawals",
            withdrawal.withdrawal_index
        )));
    }
    if withdrawal.index_params != params {
        return Err(ProofError::PrimitiveFailure(format!(
            "engine proved against {:?}, resolver gave {params:?}",
            withdrawal.index_params
        )));
    }

    let block_root = block
        .block_root()
        .map_err(|e| ProofError::PrimitiveFailure(format!("withdrawal block root: {e:?}")))?;

    Ok(WithdrawalProofBundle {
        state_root: state_root_proof.leaf,
        state_root_proof: state_root_proof.branch,
        validator_fields: validator.fields,
        validator_proof: validator.proof.branch,
        historical_summary_block_root: block_root,
        historical_summary_block_root_proof: withdrawal.historical_summary_block_root_proof.branch,
        slot_root: withdrawal.slot_root,
        slot_root_proof: slot_proof.branch,
        timestamp_root: withdrawal.timestamp_proof.leaf,
        timestamp_root_proof: withdrawal.timestamp_proof.branch,
        execution_payload_root: withdrawal.execution_payload_proof.leaf,
        execution_payload_root_proof: withdrawal.execution_payload_proof.branch,
        withdrawal_fields: withdrawal.withdrawal_fields,
        withdrawal_proof: withdrawal.withdrawal_proof.branch,
        historical_summary_index: params.historical_summary_index,
        block_root_index: params.block_root_index,
        withdrawal_index_within_block: withdrawal.withdrawal_index,
    })
}

/// Raised when the request awaiting a blocking task goes away.
#[derive(Clone, Default)]
struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    fn check(&self, stage: &'static str) -> Result<(), ProofError> {
        if self.0.load(Ordering::Acquire) {
            return Err(ProofError::PrimitiveFailure(format!(
                "request dropped before {stage}"
            )));
        }
        Ok(())
    }
}

/// Raises its [`Cancellation`] on drop.
struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        (self.0).0.store(true, Ordering::Release);
    }
}

/// Run primitives on the blocking pool; a panicked task is a primitive failure.
///
/// `f` should call [`Cancellation::check`] between stages so that a timed
/// out or abandoned request releases the blocking thread early.
async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T, ProofError>
where
    F: FnOnce(&Cancellation) -> Result<T, ProofError> + Send + 'static,
    T: Send + 'static,
{
    let cancel = Cancellation::default();
    let _guard = CancelOnDrop(cancel.clone());
    tokio::task::spawn_blocking(move || f(&cancel))
        .await
        .map_err(|e| ProofError::PrimitiveFailure(format!("{stage} task failed: {e}")))?
}

fn log_outcome<T>(operation: &'static str, result: &Result<T, ProofError>) {
    match result {
        Ok(_) => debug!(operation, "Proof assembled"),
        Err(err) if err.kind() == ProofErrorKind::PrimitiveFailure => {
            error!(operation, kind = %err.kind(), error = %err, "Proof request failed");
        }
        Err(err) => warn!(operation, kind = %err.kind(), error = %err, "Proof request failed"),
    }
}
