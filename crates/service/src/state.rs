//! Shared Application State
//!
//! Immutable proof orchestrator plus thread-safe request accounting.

use dashmap::DashMap;
use parking_lot::RwLock;
use proof_gen::{BeaconClient, ChainSpec, ProofError, ProofErrorKind, ProofOrchestrator, StateProver};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Orchestrator wired to a live beacon node
pub type Orchestrator = ProofOrchestrator<BeaconClient, StateProver>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: Orchestrator,
    chain: ChainSpec,
    /// Requests answered with a bundle
    served: AtomicU64,
    /// Failed requests by error kind
    failures: DashMap<ProofErrorKind, u64>,
    /// Service start time
    start_time: std::time::Instant,
    /// Last error message
    last_error: RwLock<Option<String>>,
}

impl AppState {
    /// Create new application state
    #[must_use]
    pub fn new(orchestrator: Orchestrator, chain: ChainSpec) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator,
                chain,
                served: AtomicU64::new(0),
                failures: DashMap::new(),
                start_time: std::time::Instant::now(),
                last_error: RwLock::new(None),
            }),
        }
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.inner.orchestrator
    }

    #[must_use]
    pub fn chain(&self) -> &ChainSpec {
        &self.inner.chain
    }

    /// Get uptime in seconds
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn record_served(&self) {
        self.inner.served.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed request and remember it as the last error
    pub fn record_failure(&self, error: &ProofError) {
        *self.inner.failures.entry(error.kind()).or_insert(0) += 1;
        *self.inner.last_error.write() = Some(error.to_string());
    }

    #[must_use]
    pub fn served(&self) -> u64 {
        self.inner.served.load(Ordering::Relaxed)
    }

    /// Failure counts keyed by error kind label; every kind is present
    #[must_use]
    pub fn failure_counts(&self) -> BTreeMap<&'static str, u64> {
        ProofErrorKind::ALL
            .iter()
            .map(|kind| {
                let count = self.inner.failures.get(kind).map_or(0, |c| *c);
                (kind.as_str(), count)
            })
            .collect()
    }

    /// Get last error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}
