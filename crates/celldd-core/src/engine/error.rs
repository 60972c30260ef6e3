use super::config::ConfigError;
use crate::comm::error::CommError;
use crate::core::grid::cell_grid::GridError;
use crate::core::models::ids::{ParticleId, Rank};
use crate::core::models::process_grid::DecompositionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decomposition error: {0}")]
    Decomposition(#[from] DecompositionError),

    #[error("Cell grid error on rank {rank}: {source}")]
    Grid {
        rank: Rank,
        #[source]
        source: GridError,
    },

    #[error("Communication failed on rank {rank}: {source}")]
    Comm {
        rank: Rank,
        #[source]
        source: CommError,
    },

    #[error(
        "Rank {rank}: particle {particle} is bonded to {partner}, which is neither local nor a ghost"
    )]
    BondPartnerMissing {
        rank: Rank,
        particle: ParticleId,
        partner: ParticleId,
    },

    #[error("Rank {rank}: particle {particle} at {position:?} lies outside the local domain")]
    ParticleOutsideDomain {
        rank: Rank,
        particle: ParticleId,
        position: [f64; 3],
    },

    #[error("Rank {rank}: particle {particle} is not resident")]
    ParticleNotFound { rank: Rank, particle: ParticleId },

    #[error("Rank {rank}: particle {particle} is already resident")]
    DuplicateParticle { rank: Rank, particle: ParticleId },

    #[error("Rank {rank}: consistency check failed: {detail}")]
    ConsistencyViolation { rank: Rank, detail: String },

    #[error(
        "Rank {rank}: periodicity changed from {from:?} to {to:?}; the communicator must be rebuilt"
    )]
    PeriodicityChanged {
        rank: Rank,
        from: [bool; 3],
        to: [bool; 3],
    },

    #[error("Rank {rank}: ghost layer is stale; a full ghost exchange must precede {operation}")]
    StaleHalo { rank: Rank, operation: &'static str },
}

impl EngineError {
    pub(crate) fn comm(rank: Rank) -> impl FnOnce(CommError) -> Self {
        move |source| EngineError::Comm { rank, source }
    }

    pub(crate) fn grid(rank: Rank) -> impl FnOnce(GridError) -> Self {
        move |source| EngineError::Grid { rank, source }
    }

    pub(crate) fn violation(rank: Rank, detail: impl Into<String>) -> Self {
        EngineError::ConsistencyViolation {
            rank,
            detail: detail.into(),
        }
    }
}
