//! Per-network constants needed to relate slots to historical summaries.

use crate::types::preset::SLOTS_PER_HISTORICAL_ROOT;
use std::fmt;
use thiserror::Error;

/// Rejected network configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainSpecError {
    #[error("unknown chain id {0}; pass --capella-fork-slot for custom networks")]
    UnknownChain(u64),

    #[error("capella fork slot {slot} conflicts with {spec} (expected {})", .spec.capella_fork_slot)]
    ConflictingCapellaSlot { spec: ChainSpec, slot: u64 },

    #[error("capella fork slot {0} is not a multiple of 8192")]
    UnalignedCapellaSlot(u64),
}

/// Network parameters, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    /// EIP-155 chain id of the paired execution chain
    pub chain_id: u64,
    /// Human readable network name
    pub name: &'static str,
    /// First slot of the Capella fork. Historical summaries are appended
    /// every 8192 slots starting here.
    pub capella_fork_slot: u64,
}

impl ChainSpec {
    pub const MAINNET: Self = Self {
        chain_id: 1,
        name: "mainnet",
        capella_fork_slot: 6_209_536,
    };

    pub const SEPOLIA: Self = Self {
        chain_id: 11_155_111,
        name: "sepolia",
        capella_fork_slot: 1_818_624,
    };

    pub const HOLESKY: Self = Self {
        chain_id: 17_000,
        name: "holesky",
        capella_fork_slot: 8192,
    };

    pub const HOODI: Self = Self {
        chain_id: 560_048,
        name: "hoodi",
        capella_fork_slot: 0,
    };

    const KNOWN: [Self; 4] = [Self::MAINNET, Self::SEPOLIA, Self::HOLESKY, Self::HOODI];

    /// Look up a known network by chain id.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::KNOWN.into_iter().find(|spec| spec.chain_id == chain_id)
    }

    /// Custom network (devnets, tests). `capella_fork_slot` must be aligned
    /// to a block-roots period.
    #[must_use]
    pub fn custom(chain_id: u64, capella_fork_slot: u64) -> Option<Self> {
        (capella_fork_slot % SLOTS_PER_HISTORICAL_ROOT as u64 == 0).then_some(Self {
            chain_id,
            name: "custom",
            capella_fork_slot,
        })
    }

    /// Network for a chain id, with an optional Capella slot override.
    ///
    /// Known chains accept only their own Capella slot; unknown chains
    /// require one.
    ///
    /// # Errors
    /// Returns an error for unknown chains without a Capella slot, for a
    /// slot that disagrees with a known chain, or for an unaligned slot.
    pub fn resolve(chain_id: u64, capella_fork_slot: Option<u64>) -> Result<Self, ChainSpecError> {
        match (Self::from_chain_id(chain_id), capella_fork_slot) {
            (Some(spec), None) => Ok(spec),
            (Some(spec), Some(slot)) if slot == spec.capella_fork_slot => Ok(spec),
            (Some(spec), Some(slot)) => Err(ChainSpecError::ConflictingCapellaSlot { spec, slot }),
            (None, Some(slot)) => {
                Self::custom(chain_id, slot).ok_or(ChainSpecError::UnalignedCapellaSlot(slot))
            }
            (None, None) => Err(ChainSpecError::UnknownChain(chain_id)),
        }
    }
}

impl fmt::Display for ChainSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain id {})", self.name, self.chain_id)
    }
}
