//! REST API Endpoints
//!
//! Proof endpoints plus health and status. Each proof request maps to one
//! orchestrator call; failures become `{ error, kind }` with a status code
//! derived from the error kind.

use crate::abi;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use proof_gen::{ProofError, ProofErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Run the API server
pub async fn run_server(listen: String, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    tracing::info!(address = %listen, "API server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route(
            "/v1/proofs/validator/{slot}/{validator_index}",
            get(validator_proof),
        )
        .route(
            "/v1/proofs/withdrawal/{state_slot}/{withdrawal_slot}/{validator_index}",
            get(withdrawal_proof),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Response encoding selected by `?encoding=`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Abi,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProofQuery {
    #[serde(default)]
    encoding: Encoding,
}

/// ABI-encoded bundle
#[derive(Serialize)]
struct EncodedResponse {
    encoded: String,
}

/// Error body returned for failed proof requests
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: ProofErrorKind,
}

/// A failed proof request, ready to be rendered
#[derive(Debug, Error)]
#[error("{status}: {}", .body.error)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<ProofError> for ApiError {
    fn from(err: ProofError) -> Self {
        let status = match err.kind() {
            ProofErrorKind::DataUnavailable if err.is_not_found() => StatusCode::NOT_FOUND,
            ProofErrorKind::DataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ProofErrorKind::UnsupportedStateVersion => StatusCode::UNPROCESSABLE_ENTITY,
            ProofErrorKind::IndexOutOfRange | ProofErrorKind::UnprovableRange => {
                StatusCode::BAD_REQUEST
            }
            ProofErrorKind::WithdrawalNotFound => StatusCode::NOT_FOUND,
            ProofErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ProofErrorKind::PrimitiveFailure => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                kind: err.kind(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Record metrics and counters for a finished request
fn observe<T>(
    state: &AppState,
    operation: &'static str,
    started: Instant,
    result: Result<T, ProofError>,
) -> Result<T, ApiError> {
    metrics::histogram!("proof_request_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.kind().as_str(),
    };
    metrics::counter!("proof_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);

    match result {
        Ok(bundle) => {
            state.record_served();
            Ok(bundle)
        }
        Err(err) => {
            state.record_failure(&err);
            Err(ApiError::from(err))
        }
    }
}

fn hex_response(bytes: &[u8]) -> Response {
    Json(EncodedResponse {
        encoded: format!("0x{}", hex::encode(bytes)),
    })
    .into_response()
}

/// `GetValidatorProof`
async fn validator_proof(
    State(state): State<AppState>,
    Path((slot, validator_index)): Path<(u64, u64)>,
    Query(query): Query<ProofQuery>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = state
        .orchestrator()
        .get_validator_proof(slot, validator_index)
        .await;
    let bundle = observe(&state, "validator", started, result)?;

    Ok(match query.encoding {
        Encoding::Json => Json(bundle).into_response(),
        Encoding::Abi => hex_response(&abi::encode_validator(&bundle)),
    })
}

/// `GetWithdrawalProof`
async fn withdrawal_proof(
    State(state): State<AppState>,
    Path((state_slot, withdrawal_slot, validator_index)): Path<(u64, u64, u64)>,
    Query(query): Query<ProofQuery>,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let result = state
        .orchestrator()
        .get_withdrawal_proof(state_slot, withdrawal_slot, validator_index)
        .await;
    let bundle = observe(&state, "withdrawal", started, result)?;

    Ok(match query.encoding {
        Encoding::Json => Json(bundle).into_response(),
        Encoding::Abi => hex_response(&abi::encode_withdrawal(&bundle)),
    })
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_secs: state.uptime_secs(),
    })
}

/// Status response
#[derive(Serialize)]
struct StatusResponse {
    chain: &'static str,
    chain_id: u64,
    capella_fork_slot: u64,
    uptime_secs: u64,
    served: u64,
    failed: BTreeMap<&'static str, u64>,
    last_error: Option<String>,
}

/// Status endpoint
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let chain = state.chain();
    Json(StatusResponse {
        chain: chain.name,
        chain_id: chain.chain_id,
        capella_fork_slot: chain.capella_fork_slot,
        uptime_secs: state.uptime_secs(),
        served: state.served(),
        failed: state.failure_counts(),
        last_error: state.last_error(),
    })
}
