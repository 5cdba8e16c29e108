//! Beacon API HTTP Client
//!
//! [`ChainDataSource`] over a standard beacon node: headers as JSON, states
//! and blocks as SSZ tagged with the `Eth-Consensus-Version` response header.

use crate::beacon_block::VersionedSignedBeaconBlock;
use crate::beacon_state::{DecodeError, VersionedBeaconState};
use crate::types::{BeaconBlockHeader, ConsensusVersion};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, instrument};

const CONSENSUS_VERSION_HEADER: &str = "Eth-Consensus-Version";

/// Errors from beacon API operations
#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Header not found for slot {0}")]
    HeaderNotFound(u64),

    #[error("State not found for slot {0}")]
    StateNotFound(u64),

    #[error("Block not found for slot {0}")]
    BlockNotFound(u64),

    #[error("Unsupported consensus version: {0}")]
    UnsupportedVersion(String),
}

impl BeaconClientError {
    /// Whether the node answered that the requested object does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::HeaderNotFound(_) | Self::StateNotFound(_) | Self::BlockNotFound(_)
        )
    }
}

impl From<DecodeError> for BeaconClientError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnsupportedVersion(version) => Self::UnsupportedVersion(version.to_string()),
            DecodeError::Ssz(msg) => Self::InvalidResponse(format!("SSZ decode: {msg}")),
        }
    }
}

/// Point-in-time chain data, keyed by slot.
///
/// Implementations must be safe to share across concurrent requests.
pub trait ChainDataSource: Send + Sync + 'static {
    /// Block header of the block at `slot`
    fn block_header(
        &self,
        slot: u64,
    ) -> impl Future<Output = Result<BeaconBlockHeader, BeaconClientError>> + Send;

    /// Full beacon state at `slot`
    fn beacon_state(
        &self,
        slot: u64,
    ) -> impl Future<Output = Result<VersionedBeaconState, BeaconClientError>> + Send;

    /// Signed block at `slot`
    fn signed_block(
        &self,
        slot: u64,
    ) -> impl Future<Output = Result<VersionedSignedBeaconBlock, BeaconClientError>> + Send;
}

/// Client for interacting with the Beacon API
#[derive(Debug, Clone)]
pub struct BeaconClient {
    client: Client,
    base_url: String,
}

impl BeaconClient {
    /// Create a new beacon client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the beacon node (e.g., `http://localhost:5052`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a beacon client on top of a preconfigured `reqwest::Client`
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET an SSZ-encoded object and return it with its fork tag.
    async fn get_ssz(
        &self,
        url: &str,
        not_found: BeaconClientError,
    ) -> Result<(ConsensusVersion, Vec<u8>), BeaconClientError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/octet-stream")
            .send()
            .await?;

        let response = check_status(response, not_found)?;
        let version = consensus_version(&response)?;
        let bytes = response.bytes().await?.to_vec();
        debug!(%version, len = bytes.len(), "fetched SSZ payload");

        Ok((version, bytes))
    }
}

fn check_status(response: Response, not_found: BeaconClientError) -> Result<Response, BeaconClientError> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(not_found);
    }

    if !response.status().is_success() {
        return Err(BeaconClientError::InvalidResponse(format!(
            "Unexpected status: {}",
            response.status()
        )));
    }

    Ok(response)
}

fn consensus_version(response: &Response) -> Result<ConsensusVersion, BeaconClientError> {
    let raw = response
        .headers()
        .get(CONSENSUS_VERSION_HEADER)
        .ok_or_else(|| {
            BeaconClientError::InvalidResponse(format!("Missing {CONSENSUS_VERSION_HEADER} header"))
        })?
        .to_str()
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid version header: {e}")))?;

    let version: ConsensusVersion = raw.parse().map_err(BeaconClientError::UnsupportedVersion)?;
    if !version.is_supported() {
        return Err(BeaconClientError::UnsupportedVersion(version.to_string()));
    }
    Ok(version)
}

/// Decode on the blocking pool; a mainnet state is hundreds of megabytes.
async fn decode_blocking<T, F>(bytes: Vec<u8>, decode: F) -> Result<T, BeaconClientError>
where
    T: Send + 'static,
    F: FnOnce(&[u8]) -> Result<T, DecodeError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Decode task failed: {e}")))?
        .map_err(Into::into)
}

impl ChainDataSource for BeaconClient {
    #[instrument(skip(self))]
    async fn block_header(&self, slot: u64) -> Result<BeaconBlockHeader, BeaconClientError> {
        let url = format!("{}/eth/v1/beacon/headers/{slot}", self.base_url);

        let response = self.client.get(&url).send().await?;
        let response = check_status(response, BeaconClientError::HeaderNotFound(slot))?;

        #[derive(Deserialize)]
        struct HeaderResponse {
            data: HeaderData,
        }

        #[derive(Deserialize)]
        struct HeaderData {
            header: HeaderMessage,
        }

        #[derive(Deserialize)]
        struct HeaderMessage {
            message: BeaconBlockHeaderJson,
        }

        #[derive(Deserialize)]
        struct BeaconBlockHeaderJson {
            slot: String,
            proposer_index: String,
            parent_root: String,
            state_root: String,
            body_root: String,
        }

        let header_resp: HeaderResponse = response.json().await?;
        let msg = header_resp.data.header.message;

        Ok(BeaconBlockHeader {
            slot: msg.slot.parse().map_err(|e| {
                BeaconClientError::InvalidResponse(format!("Invalid slot: {e}"))
            })?,
            proposer_index: msg.proposer_index.parse().map_err(|e| {
                BeaconClientError::InvalidResponse(format!("Invalid proposer_index: {e}"))
            })?,
            parent_root: parse_hex32(&msg.parent_root)?,
            state_root: parse_hex32(&msg.state_root)?,
            body_root: parse_hex32(&msg.body_root)?,
        })
    }

    #[instrument(skip(self))]
    async fn beacon_state(&self, slot: u64) -> Result<VersionedBeaconState, BeaconClientError> {
        let url = format!("{}/eth/v2/debug/beacon/states/{slot}", self.base_url);
        let (version, bytes) = self
            .get_ssz(&url, BeaconClientError::StateNotFound(slot))
            .await?;

        decode_blocking(bytes, move |b| VersionedBeaconState::from_ssz(version, b)).await
    }

    #[instrument(skip(self))]
    async fn signed_block(&self, slot: u64) -> Result<VersionedSignedBeaconBlock, BeaconClientError> {
        let url = format!("{}/eth/v2/beacon/blocks/{slot}", self.base_url);
        let (version, bytes) = self
            .get_ssz(&url, BeaconClientError::BlockNotFound(slot))
            .await?;

        decode_blocking(bytes, move |b| VersionedSignedBeaconBlock::from_ssz(version, b)).await
    }
}

fn parse_hex32(s: &str) -> Result<[u8; 32], BeaconClientError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| BeaconClientError::InvalidResponse("Expected 32 bytes".to_string()))
}
