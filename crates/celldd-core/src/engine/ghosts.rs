use super::error::EngineError;
use super::state::SimulationState;
use crate::comm::codec::{self, FrameReader};
use crate::comm::direction::Direction;
use crate::comm::exchange::{Communicator, Frame};
use crate::comm::transport::{Tag, Transport};
use crate::core::grid::cell_grid::CellGrid;
use crate::core::models::ids::Slot;
use crate::core::models::particle::Particle;
use tracing::{debug, instrument, warn};

/// Static per-direction cell lists of the ghost protocol.
///
/// For direction `dir`, `send_cells(dir)` lists the boundary layer shipped towards the
/// neighbour in `dir`, and `recv_cells(dir)` lists the halo layer on the opposite face that
/// is filled by the neighbour's shipment in the same pass. Axes are processed in order; the
/// layers of a later axis span the halo of earlier axes, so edge and corner ghosts propagate.
/// Both lists are ordered identically on every rank, which pairs each send cell with the
/// receive cell on the other side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GhostPlan {
    send_cells: [Vec<usize>; 6],
    recv_cells: [Vec<usize>; 6],
}

impl GhostPlan {
    pub fn new(grid: &CellGrid) -> Self {
        let ghost = grid.ghost_dims();
        let inner = grid.inner_dims();
        let mut plan = Self::default();

        for axis in 0..3 {
            let mut lo = [0; 3];
            let mut hi = [0; 3];
            for other in 0..3 {
                if other < axis {
                    lo[other] = 0;
                    hi[other] = ghost[other] - 1;
                } else {
                    lo[other] = 1;
                    hi[other] = inner[other];
                }
            }
            let layer = |layer: usize| {
                let (mut lo, mut hi) = (lo, hi);
                lo[axis] = layer;
                hi[axis] = layer;
                grid.sub_grid_indices(lo, hi)
            };

            plan.send_cells[2 * axis] = layer(1);
            plan.recv_cells[2 * axis] = layer(inner[axis] + 1);
            plan.send_cells[2 * axis + 1] = layer(inner[axis]);
            plan.recv_cells[2 * axis + 1] = layer(0);
        }
        plan
    }

    pub fn send_cells(&self, dir: Direction) -> &[usize] {
        &self.send_cells[dir.index()]
    }

    pub fn recv_cells(&self, dir: Direction) -> &[usize] {
        &self.recv_cells[dir.index()]
    }
}

/// Empties every halo cell and drops the lookup entries held by its ghosts.
pub fn invalidate_ghosts(state: &mut SimulationState) {
    let SimulationState {
        grid, cells, index, ..
    } = &mut *state;
    for &cell in grid.halo_cells() {
        for (i, particle) in cells[cell].particles.iter().enumerate() {
            index.remove_if_at(particle.id, Slot::new(cell, i));
        }
        cells[cell].particles.clear();
    }
    state.resend_halo = true;
}

/// Rebuilds the ghost layer from scratch.
///
/// Every direction ships, per send cell, the particle count followed by the reduced records
/// `(id, type, position)`, with positions shifted across periodic box faces. The receiving
/// halo cells are replaced with the incoming ghosts. Returns the number of ghosts now held.
#[instrument(skip_all, name = "exchange_ghosts", fields(rank = state.rank))]
pub fn exchange_ghosts<T: Transport>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
) -> Result<usize, EngineError> {
    let rank = state.rank;
    invalidate_ghosts(state);

    let mut outgoing = Frame::default();
    let mut incoming = Frame::default();
    for dir in Direction::ALL {
        outgoing.clear();
        if comm.route(dir).sends() {
            let axis = dir.axis();
            let shift = state.boundary_shift(dir);
            for &cell in state.plan.send_cells(dir) {
                let particles = &state.cells[cell].particles;
                outgoing.counts.push(particles.len() as u64);
                for particle in particles {
                    let mut record = particle.reduced();
                    record.position[axis] += shift;
                    codec::encode_ghost(&mut outgoing.payload, &record);
                }
            }
        }

        comm.exchange(dir, Tag::Ghosts, &mut outgoing, &mut incoming)
            .map_err(EngineError::comm(rank))?;
        unpack_ghosts(state, dir, &incoming)?;
    }

    state.resend_halo = false;
    let ghosts = state.n_ghost_particles();
    debug!(ghosts, "Ghost layer rebuilt.");
    if state.config.strict_checks {
        state.check_consistency()?;
    }
    Ok(ghosts)
}

fn unpack_ghosts(
    state: &mut SimulationState,
    dir: Direction,
    incoming: &Frame,
) -> Result<(), EngineError> {
    let SimulationState {
        rank,
        plan,
        cells,
        index,
        ..
    } = &mut *state;
    if incoming.counts.is_empty() {
        return Ok(());
    }
    let recv_cells = plan.recv_cells(dir);
    if incoming.counts.len() != recv_cells.len() {
        return Err(EngineError::violation(
            *rank,
            format!(
                "{dir:?} ghost header lists {} cells, the halo layer has {}",
                incoming.counts.len(),
                recv_cells.len()
            ),
        ));
    }

    let mut reader = FrameReader::new(Tag::Ghosts, &incoming.payload);
    for (&cell, &count) in recv_cells.iter().zip(&incoming.counts) {
        let particles = &mut cells[cell].particles;
        particles.clear();
        for slot in 0..count as usize {
            let record = codec::decode_ghost(&mut reader).map_err(EngineError::comm(*rank))?;
            index.insert_if_absent(record.id, Slot::new(cell, slot));
            particles.push(Particle::ghost(&record));
        }
    }
    reader.finish().map_err(EngineError::comm(*rank))
}

fn count_particles(state: &SimulationState, cells: &[usize]) -> usize {
    cells.iter().map(|&cell| state.cells[cell].len()).sum()
}

/// Refreshes ghost positions without changing ghost membership.
///
/// Walks the directions in the same order as [`exchange_ghosts`] and ships positions only.
/// With a stale halo this is an error in strict mode; otherwise a full exchange is done.
#[instrument(skip_all, name = "update_ghost_pos", fields(rank = state.rank))]
pub fn update_ghost_pos<T: Transport>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
) -> Result<(), EngineError> {
    let rank = state.rank;
    if state.resend_halo {
        if state.config.strict_checks {
            return Err(EngineError::StaleHalo {
                rank,
                operation: "update_ghost_pos",
            });
        }
        warn!("Ghost layer is stale; falling back to a full ghost exchange.");
        return exchange_ghosts(state, comm).map(|_| ());
    }

    let mut outgoing = Frame::default();
    let mut incoming = Frame::default();
    for dir in Direction::ALL {
        outgoing.clear();
        if comm.route(dir).sends() {
            let axis = dir.axis();
            let shift = state.boundary_shift(dir);
            let mut n = 0;
            for &cell in state.plan.send_cells(dir) {
                for particle in &state.cells[cell].particles {
                    let mut position = particle.position;
                    position[axis] += shift;
                    codec::write_point(&mut outgoing.payload, &position);
                    n += 1;
                }
            }
            outgoing.counts.push(n);
        }

        comm.exchange(dir, Tag::Positions, &mut outgoing, &mut incoming)
            .map_err(EngineError::comm(rank))?;
        let Some(&received) = incoming.counts.first() else {
            continue;
        };

        let expected = count_particles(state, state.plan.recv_cells(dir));
        if received as usize != expected {
            return Err(EngineError::violation(
                rank,
                format!("{dir:?} position refresh carries {received} entries, the halo holds {expected}"),
            ));
        }
        let SimulationState { plan, cells, .. } = &mut *state;
        let mut reader = FrameReader::new(Tag::Positions, &incoming.payload);
        for &cell in plan.recv_cells(dir) {
            for particle in cells[cell].particles.iter_mut() {
                particle.position = reader.read_point().map_err(EngineError::comm(rank))?;
            }
        }
        reader.finish().map_err(EngineError::comm(rank))?;
    }
    Ok(())
}

/// Sends the forces accumulated on ghosts back to the owning ranks.
///
/// Directions are walked in reverse order. Each halo layer's forces travel back to the rank
/// that supplied the ghosts and are added, in order, onto the particles of the matching send
/// layer there. Forces picked up by edge and corner ghosts are thereby relayed until they
/// reach the real particle.
#[instrument(skip_all, name = "collect_ghost_forces", fields(rank = state.rank))]
pub fn collect_ghost_forces<T: Transport>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
) -> Result<(), EngineError> {
    let rank = state.rank;
    if state.resend_halo {
        return Err(EngineError::StaleHalo {
            rank,
            operation: "collect_ghost_forces",
        });
    }

    let mut outgoing = Frame::default();
    let mut incoming = Frame::default();
    for dir in Direction::ALL.into_iter().rev() {
        let back = dir.opposite();
        outgoing.clear();
        if comm.route(back).sends() {
            let mut n = 0;
            for &cell in state.plan.recv_cells(dir) {
                for particle in &state.cells[cell].particles {
                    codec::write_vector(&mut outgoing.payload, &particle.force);
                    n += 1;
                }
            }
            outgoing.counts.push(n);
        }

        comm.exchange(back, Tag::Forces, &mut outgoing, &mut incoming)
            .map_err(EngineError::comm(rank))?;
        let Some(&received) = incoming.counts.first() else {
            continue;
        };

        let expected = count_particles(state, state.plan.send_cells(dir));
        if received as usize != expected {
            return Err(EngineError::violation(
                rank,
                format!("{dir:?} force return carries {received} entries, the send layer holds {expected}"),
            ));
        }
        let SimulationState { plan, cells, .. } = &mut *state;
        let mut reader = FrameReader::new(Tag::Forces, &incoming.payload);
        for &cell in plan.send_cells(dir) {
            for particle in cells[cell].particles.iter_mut() {
                particle.force += reader.read_vector().map_err(EngineError::comm(rank))?;
            }
        }
        reader.finish().map_err(EngineError::comm(rank))?;
    }
    Ok(())
}
