use crate::core::grid::cell::{Cell, NeighborEntry};
use crate::core::models::ids::Slot;
use crate::core::models::particle::Particle;
use crate::engine::state::SimulationState;
use nalgebra::{Point3, Vector3};

/// What a force kernel sees of a rank: the inner cells with their upper-half neighbour lists,
/// the reusable pair buffers, and the force accumulators of real and ghost particles.
pub struct InteractionView<'a> {
    cells: &'a mut [Cell],
    inner: &'a [usize],
    cutoff: f64,
}

impl<'a> InteractionView<'a> {
    pub fn new(state: &'a mut SimulationState) -> Self {
        Self {
            cutoff: state.grid.cutoff(),
            inner: state.grid.inner_cells(),
            cells: &mut state.cells,
        }
    }

    /// The interaction cutoff the grid was sized for.
    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn inner_cells(&self) -> &[usize] {
        self.inner
    }

    pub fn particles(&self, cell: usize) -> &[Particle] {
        &self.cells[cell].particles
    }

    pub fn neighbors(&self, cell: usize) -> &[NeighborEntry] {
        &self.cells[cell].neighbors
    }

    pub fn particle(&self, slot: Slot) -> &Particle {
        &self.cells[slot.cell].particles[slot.index]
    }

    pub fn position(&self, slot: Slot) -> &Point3<f64> {
        &self.particle(slot).position
    }

    pub fn add_force(&mut self, slot: Slot, force: Vector3<f64>) {
        self.cells[slot.cell].particles[slot.index].force += force;
    }

    /// Fills every pair buffer with the particle pairs closer than `range` and returns the
    /// number of pairs found.
    ///
    /// Each inner cell is paired with itself (each unordered pair once) and with the
    /// neighbours of its upper-half list, so every pair within range is listed exactly once
    /// on exactly one rank as long as `range` does not exceed the cell size.
    pub fn build_pair_lists(&mut self, range: f64) -> usize {
        let range_sq = range * range;
        let mut total = 0;
        for &cell in self.inner {
            let mut entries = std::mem::take(&mut self.cells[cell].neighbors);
            for entry in &mut entries {
                entry.pairs.clear();
                let own = &self.cells[cell].particles;
                let other = &self.cells[entry.cell].particles;
                for (i, a) in own.iter().enumerate() {
                    let start = if entry.cell == cell { i + 1 } else { 0 };
                    for (j, b) in other.iter().enumerate().skip(start) {
                        if (b.position - a.position).norm_squared() < range_sq {
                            entry.pairs.push(i, j);
                        }
                    }
                }
                total += entry.pairs.len();
            }
            self.cells[cell].neighbors = entries;
        }
        total
    }

    /// All pairs currently held in the pair buffers.
    pub fn pairs(&self) -> impl Iterator<Item = (Slot, Slot)> + '_ {
        self.inner.iter().flat_map(move |&cell| {
            self.cells[cell].neighbors.iter().flat_map(move |entry| {
                entry
                    .pairs
                    .iter()
                    .map(move |(i, j)| (Slot::new(cell, i), Slot::new(entry.cell, j)))
            })
        })
    }
}
