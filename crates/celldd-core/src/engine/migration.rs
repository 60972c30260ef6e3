use super::error::EngineError;
use super::ghosts;
use super::state::SimulationState;
use crate::comm::codec::{self, FrameReader};
use crate::comm::direction::Direction;
use crate::comm::exchange::{Communicator, Frame};
use crate::comm::transport::{Tag, Transport};
use crate::core::utils::geometry::fold_coordinate;
use tracing::{debug, instrument, trace};

/// Bookkeeping of one migration pass on one rank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Particles shipped to neighbours, summed over all directions.
    pub sent: usize,
    /// Particles received from neighbours, summed over all directions.
    pub received: usize,
    /// Staying particles moved to a different cell in the final pass.
    pub resorted: usize,
}

/// Hands particles that left the domain to the neighbouring ranks and sorts the rest into
/// their cells.
///
/// For each direction in [`Direction::ALL`], every real particle beyond that face is removed
/// from its cell and shipped to the face neighbour with its bonds. Received particles are
/// folded into the periodic box and placed with a capped lookup, so a particle may be relayed
/// further along a later axis in the same pass. Particles beyond a non-periodic face of the
/// global box are kept and clamped into the edge cell. In the final direction, staying
/// particles that changed cell are re-sorted. The halo is cleared and the lookup table is
/// rebuilt from the inner cells.
#[instrument(skip_all, name = "exchange_and_sort", fields(rank = state.rank))]
pub fn exchange_and_sort<T: Transport>(
    state: &mut SimulationState,
    comm: &Communicator<T>,
) -> Result<MigrationStats, EngineError> {
    let rank = state.rank;
    let n_before = state.n_real_particles();
    ghosts::invalidate_ghosts(state);

    let mut stats = MigrationStats::default();
    let mut outgoing = Frame::default();
    let mut incoming = Frame::default();
    for dir in Direction::ALL {
        outgoing.clear();
        let n_out = collect_leaving(state, dir, comm.route(dir).sends(), &mut outgoing, &mut stats)?;
        outgoing.counts.push(n_out);
        stats.sent += n_out as usize;

        comm.exchange(dir, Tag::Particles, &mut outgoing, &mut incoming)
            .map_err(EngineError::comm(rank))?;
        stats.received += append_particles(state, dir, &incoming)?;
    }

    state
        .index
        .rebuild(&state.cells, state.grid.inner_cells());
    state.resend_halo = true;

    debug!(
        sent = stats.sent,
        received = stats.received,
        resorted = stats.resorted,
        "Particle exchange complete."
    );

    if state.config.strict_checks {
        let n_after = state.n_real_particles();
        if n_before + stats.received != n_after + stats.sent {
            return Err(EngineError::violation(
                rank,
                format!(
                    "particle bookkeeping mismatch: {n_before} before + {} received != {n_after} after + {} sent",
                    stats.received, stats.sent
                ),
            ));
        }
        if state.n_ghost_particles() != 0 {
            return Err(EngineError::violation(rank, "halo cells hold particles after migration"));
        }
        state.check_consistency()?;
    }
    Ok(stats)
}

fn collect_leaving(
    state: &mut SimulationState,
    dir: Direction,
    can_send: bool,
    outgoing: &mut Frame,
    stats: &mut MigrationStats,
) -> Result<u64, EngineError> {
    let SimulationState {
        rank,
        domain,
        grid,
        cells,
        index,
        ..
    } = &mut *state;
    let axis = dir.axis();
    let last = dir == Direction::ZHigh;
    let mut n_out = 0;

    for &cell in grid.inner_cells() {
        let mut i = 0;
        while i < cells[cell].particles.len() {
            let x = cells[cell].particles[i].position[axis];
            let leaves = if dir.is_high() {
                x >= domain.upper[axis]
            } else {
                x < domain.lower[axis]
            };

            if leaves && can_send {
                let particle = cells[cell].particles.swap_remove(i);
                index.remove(particle.id);
                trace!(particle = %particle.id, ?dir, "Particle leaves the domain.");
                codec::encode_particle(&mut outgoing.payload, &particle);
                n_out += 1;
                continue;
            }

            if last {
                let target = grid
                    .locate(&cells[cell].particles[i].position)
                    .map_err(EngineError::grid(*rank))?;
                if target != cell {
                    let particle = cells[cell].particles.swap_remove(i);
                    cells[target].particles.push(particle);
                    stats.resorted += 1;
                    continue;
                }
            }
            i += 1;
        }
    }
    Ok(n_out)
}

fn append_particles(
    state: &mut SimulationState,
    dir: Direction,
    incoming: &Frame,
) -> Result<usize, EngineError> {
    let SimulationState {
        rank,
        geometry,
        grid,
        cells,
        ..
    } = &mut *state;
    let Some(&count) = incoming.counts.first() else {
        return Ok(0);
    };
    let axis = dir.axis();
    let periodic = geometry.is_periodic(axis);
    let box_length = geometry.lengths()[axis];

    let mut reader = FrameReader::new(Tag::Particles, &incoming.payload);
    for _ in 0..count {
        let mut particle = codec::decode_particle(&mut reader).map_err(EngineError::comm(*rank))?;
        if periodic {
            fold_coordinate(&mut particle.position, &mut particle.image, axis, box_length);
        }
        let cell = grid.locate_capped(&particle.position);
        trace!(particle = %particle.id, cell, "Particle arrives.");
        cells[cell].particles.push(particle);
    }
    reader.finish().map_err(EngineError::comm(*rank))?;
    Ok(count as usize)
}

/// Checks that every bond partner of every real particle is resident, as a real particle or
/// a ghost. Run after the ghost layer has been rebuilt.
pub fn resolve_bonds(state: &SimulationState) -> Result<(), EngineError> {
    for particle in state.real_particles() {
        if let Some(partner) = particle
            .bond_partners()
            .find(|&partner| !state.index.contains(partner))
        {
            return Err(EngineError::BondPartnerMissing {
                rank: state.rank,
                particle: particle.id,
                partner,
            });
        }
    }
    Ok(())
}
