use super::interaction::InteractionView;
use crate::comm::exchange::Communicator;
use crate::comm::transport::Transport;
use crate::engine::error::EngineError;
use crate::engine::ghosts;
use crate::engine::migration::{self, MigrationStats};
use crate::engine::state::SimulationState;
use tracing::{debug, instrument};

/// Seam for force computation: kernels read positions through the view and write into the
/// force accumulators of real and ghost particles.
pub trait ForceKernel {
    fn compute(&mut self, view: &mut InteractionView<'_>) -> Result<(), EngineError>;
}

/// Summary of one call to [`prepare_step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Migration bookkeeping, present when the full path ran.
    pub migration: Option<MigrationStats>,
    pub real: usize,
    pub ghosts: usize,
}

impl StepReport {
    pub fn rebuilt(&self) -> bool {
        self.migration.is_some()
    }
}

/// Brings real particles and ghosts up to date before force computation.
///
/// The full path (migrate, rebuild ghosts, resolve bonds) runs when `rebuild` is requested or
/// the ghost layer is stale; otherwise only ghost positions are refreshed.
#[instrument(skip_all, name = "prepare_step", fields(rank = state.rank()))]
pub fn prepare_step<T: Transport>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
    rebuild: bool,
) -> Result<StepReport, EngineError> {
    let migration = if rebuild || state.is_halo_stale() {
        let stats = migration::exchange_and_sort(state, comm)?;
        ghosts::exchange_ghosts(state, comm)?;
        migration::resolve_bonds(state)?;
        Some(stats)
    } else {
        ghosts::update_ghost_pos(state, comm)?;
        None
    };
    let report = StepReport {
        migration,
        real: state.n_real_particles(),
        ghosts: state.n_ghost_particles(),
    };
    debug!(
        rebuilt = report.rebuilt(),
        real = report.real,
        ghosts = report.ghosts,
        "Step prepared."
    );
    Ok(report)
}

/// Resets all forces, runs `kernel` and returns ghost forces to their owners.
#[instrument(skip_all, name = "compute_forces", fields(rank = state.rank()))]
pub fn compute_forces<T: Transport, K: ForceKernel + ?Sized>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
    kernel: &mut K,
) -> Result<(), EngineError> {
    state.reset_forces();
    kernel.compute(&mut InteractionView::new(state))?;
    ghosts::collect_ghost_forces(state, comm)
}

/// Number of real particles summed over all ranks.
pub fn global_particle_count<T: Transport>(
    state: &SimulationState,
    comm: &Communicator<T>,
) -> Result<u64, EngineError> {
    comm.all_reduce_sum(state.n_real_particles() as u64)
        .map_err(EngineError::comm(state.rank()))
}
