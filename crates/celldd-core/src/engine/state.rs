use super::config::DecompositionConfig;
use super::error::EngineError;
use super::ghosts::{self, GhostPlan};
use super::lookup::LocalIndex;
use super::migration::{self, MigrationStats};
use crate::comm::direction::Direction;
use crate::comm::exchange::Communicator;
use crate::comm::transport::Transport;
use crate::core::grid::cell::Cell;
use crate::core::grid::cell_grid::CellGrid;
use crate::core::models::geometry::{BoxGeometry, Domain};
use crate::core::models::ids::{ParticleId, Rank, Slot};
use crate::core::models::particle::Particle;
use crate::core::models::process_grid::ProcessGrid;
use nalgebra::Vector3;
use tracing::{info, instrument};

/// Everything one rank knows about the decomposition.
///
/// The state owns the rank's domain, its cell grid with all particles (real particles in inner
/// cells, ghosts in halo cells), the static ghost communication plan and the identity lookup
/// table. It is mutated only by its own worker.
#[derive(Debug)]
pub struct SimulationState {
    pub(crate) rank: Rank,
    pub(crate) config: DecompositionConfig,
    pub(crate) geometry: BoxGeometry,
    pub(crate) process_grid: ProcessGrid,
    pub(crate) domain: Domain,
    pub(crate) grid: CellGrid,
    pub(crate) cells: Vec<Cell>,
    pub(crate) plan: GhostPlan,
    pub(crate) index: LocalIndex,
    pub(crate) boundary: [i8; 6],
    pub(crate) resend_halo: bool,
}

fn build_grid(
    rank: Rank,
    domain: &Domain,
    geometry: &BoxGeometry,
    config: &DecompositionConfig,
) -> Result<CellGrid, EngineError> {
    let cells = &config.cells;
    CellGrid::build(
        domain,
        geometry.periodic(),
        cells.cutoff,
        cells.skin,
        cells.max_num_cells,
    )
    .map(|grid| grid.with_strict_checks(config.strict_checks))
    .map_err(EngineError::grid(rank))
}

impl SimulationState {
    /// Sets up an empty rank: its domain, cell grid and ghost plan.
    ///
    /// # Arguments
    ///
    /// * `rank` - This worker's rank in `process_grid`.
    /// * `config` - Cell sizing and strictness.
    /// * `geometry` - The global box.
    /// * `process_grid` - The grid of all ranks.
    ///
    /// # Errors
    ///
    /// Fails if `rank` is not part of the grid or the domain cannot be decomposed into cells.
    pub fn new(
        rank: Rank,
        config: DecompositionConfig,
        geometry: BoxGeometry,
        process_grid: ProcessGrid,
    ) -> Result<Self, EngineError> {
        process_grid.check_rank(rank)?;
        let domain = process_grid.domain_of(rank, &geometry);
        let grid = build_grid(rank, &domain, &geometry, &config)?;
        let cells = grid.allocate_cells();
        let plan = GhostPlan::new(&grid);
        info!(
            rank,
            lower = ?[domain.lower.x, domain.lower.y, domain.lower.z],
            upper = ?[domain.upper.x, domain.upper.y, domain.upper.z],
            "Rank state initialized."
        );
        Ok(Self {
            rank,
            config,
            geometry,
            process_grid,
            domain,
            grid,
            cells,
            plan,
            index: LocalIndex::new(),
            boundary: process_grid.boundary_signs(rank, &geometry),
            resend_halo: true,
        })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn geometry(&self) -> &BoxGeometry {
        &self.geometry
    }

    pub fn process_grid(&self) -> &ProcessGrid {
        &self.process_grid
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn ghost_plan(&self) -> &GhostPlan {
        &self.plan
    }

    pub fn index(&self) -> &LocalIndex {
        &self.index
    }

    pub fn is_halo_stale(&self) -> bool {
        self.resend_halo
    }

    /// Flags the ghost layer as out of date after an external change of real particles.
    pub fn mark_halo_stale(&mut self) {
        self.resend_halo = true;
    }

    /// Shift added to positions sent towards `dir`.
    pub(crate) fn boundary_shift(&self, dir: Direction) -> f64 {
        f64::from(self.boundary[dir.index()]) * self.geometry.lengths()[dir.axis()]
    }

    /// Adds a real particle to the cell owning its position.
    ///
    /// # Errors
    ///
    /// Fails if the position lies outside this rank's domain or a real particle with the same
    /// id is already resident.
    pub fn insert_particle(&mut self, particle: Particle) -> Result<ParticleId, EngineError> {
        let id = particle.id;
        if !self.domain.contains(&particle.position) {
            return Err(EngineError::ParticleOutsideDomain {
                rank: self.rank,
                particle: id,
                position: [particle.position.x, particle.position.y, particle.position.z],
            });
        }
        if self.is_real(id) {
            return Err(EngineError::DuplicateParticle {
                rank: self.rank,
                particle: id,
            });
        }
        let cell = self
            .grid
            .locate(&particle.position)
            .map_err(EngineError::grid(self.rank))?;
        let slot = Slot::new(cell, self.cells[cell].particles.len());
        self.cells[cell].particles.push(particle);
        self.index.insert(id, slot);
        self.resend_halo = true;
        Ok(id)
    }

    /// Removes a real particle and returns it.
    pub fn remove_particle(&mut self, id: ParticleId) -> Result<Particle, EngineError> {
        let slot = self
            .real_slot(id)
            .ok_or(EngineError::ParticleNotFound {
                rank: self.rank,
                particle: id,
            })?;
        let particles = &mut self.cells[slot.cell].particles;
        let particle = particles.swap_remove(slot.index);
        self.index.remove(id);
        if let Some(moved) = particles.get(slot.index) {
            self.index.insert(moved.id, slot);
        }
        self.resend_halo = true;
        Ok(particle)
    }

    fn real_slot(&self, id: ParticleId) -> Option<Slot> {
        self.index.get(id).filter(|slot| self.grid.is_inner(slot.cell))
    }

    /// Whether the real copy of `id` lives on this rank.
    pub fn is_real(&self, id: ParticleId) -> bool {
        self.real_slot(id).is_some()
    }

    /// Looks up a resident particle, real or ghost; the real copy wins.
    pub fn particle(&self, id: ParticleId) -> Option<&Particle> {
        let slot = self.index.get(id)?;
        self.cells.get(slot.cell)?.particles.get(slot.index)
    }

    pub fn particle_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        let slot = self.index.get(id)?;
        self.cells.get_mut(slot.cell)?.particles.get_mut(slot.index)
    }

    pub fn n_real_particles(&self) -> usize {
        self.grid
            .inner_cells()
            .iter()
            .map(|&cell| self.cells[cell].len())
            .sum()
    }

    pub fn n_ghost_particles(&self) -> usize {
        self.grid
            .halo_cells()
            .iter()
            .map(|&cell| self.cells[cell].len())
            .sum()
    }

    /// Inner cells with their linear index.
    pub fn inner_cells(&self) -> impl Iterator<Item = (usize, &Cell)> + '_ {
        self.grid
            .inner_cells()
            .iter()
            .map(move |&cell| (cell, &self.cells[cell]))
    }

    pub fn real_particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.inner_cells()
            .flat_map(|(_, cell)| cell.particles.iter())
    }

    /// Mutable access to real particles, e.g. for an integrator. Moving particles does not
    /// change cell membership until the next migration.
    pub fn real_particles_mut(&mut self) -> impl Iterator<Item = &mut Particle> + '_ {
        let grid = &self.grid;
        self.cells
            .iter_mut()
            .enumerate()
            .filter(move |(cell, _)| grid.is_inner(*cell))
            .flat_map(|(_, cell)| cell.particles.iter_mut())
    }

    pub fn ghost_particles(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.grid
            .halo_cells()
            .iter()
            .flat_map(move |&cell| self.cells[cell].particles.iter())
    }

    pub fn ghost_particles_mut(&mut self) -> impl Iterator<Item = &mut Particle> + '_ {
        let grid = &self.grid;
        self.cells
            .iter_mut()
            .enumerate()
            .filter(move |(cell, _)| !grid.is_inner(*cell))
            .flat_map(|(_, cell)| cell.particles.iter_mut())
    }

    /// Zeroes the force accumulator of every resident particle, ghosts included.
    pub fn reset_forces(&mut self) {
        for particle in self.cells.iter_mut().flat_map(|cell| cell.particles.iter_mut()) {
            particle.force = Vector3::zeros();
        }
    }

    pub fn add_force(&mut self, id: ParticleId, force: Vector3<f64>) -> Result<(), EngineError> {
        let rank = self.rank;
        let particle = self.particle_mut(id).ok_or(EngineError::ParticleNotFound {
            rank,
            particle: id,
        })?;
        particle.force += force;
        Ok(())
    }

    /// Rebuilds the decomposition for a changed box.
    ///
    /// Ghosts are dropped, the domain, cell grid and ghost plan are rebuilt for `geometry`,
    /// real particles are moved into the new grid and then migrated to the ranks now owning
    /// them. With strict checks the global particle count is verified to be unchanged. The
    /// ghost layer is left stale.
    ///
    /// # Errors
    ///
    /// Only the box lengths may change. The routes of `comm` were built for the current
    /// periodicity, so a geometry with different periodicity is rejected before anything is
    /// modified or exchanged.
    #[instrument(skip_all, name = "topology_changed", fields(rank = self.rank))]
    pub fn topology_changed<T: Transport>(
        &mut self,
        geometry: BoxGeometry,
        comm: &Communicator<T>,
    ) -> Result<MigrationStats, EngineError> {
        if geometry.periodic() != self.geometry.periodic() {
            return Err(EngineError::PeriodicityChanged {
                rank: self.rank,
                from: self.geometry.periodic(),
                to: geometry.periodic(),
            });
        }
        let strict = self.config.strict_checks;
        let before = if strict {
            Some(
                comm.all_reduce_sum(self.n_real_particles() as u64)
                    .map_err(EngineError::comm(self.rank))?,
            )
        } else {
            None
        };

        ghosts::invalidate_ghosts(self);
        let particles: Vec<Particle> = self
            .grid
            .inner_cells()
            .iter()
            .flat_map(|&cell| std::mem::take(&mut self.cells[cell].particles))
            .collect();

        let domain = self.process_grid.domain_of(self.rank, &geometry);
        let grid = build_grid(self.rank, &domain, &geometry, &self.config)?;
        self.cells = grid.allocate_cells();
        self.plan = GhostPlan::new(&grid);
        self.boundary = self.process_grid.boundary_signs(self.rank, &geometry);
        self.geometry = geometry;
        self.domain = domain;
        self.grid = grid;

        for particle in particles {
            let cell = self.grid.locate_capped(&particle.position);
            self.cells[cell].particles.push(particle);
        }
        self.index.rebuild(&self.cells, self.grid.inner_cells());

        let stats = migration::exchange_and_sort(self, comm)?;

        if let Some(before) = before {
            let after = comm
                .all_reduce_sum(self.n_real_particles() as u64)
                .map_err(EngineError::comm(self.rank))?;
            if before != after {
                return Err(EngineError::violation(
                    self.rank,
                    format!("global particle count changed from {before} to {after} on topology change"),
                ));
            }
        }

        self.resend_halo = true;
        info!(
            real = self.n_real_particles(),
            ghost_dims = ?self.grid.ghost_dims(),
            "Decomposition rebuilt for new topology."
        );
        Ok(stats)
    }
}
