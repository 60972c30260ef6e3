use super::error::EngineError;
use super::state::SimulationState;
use crate::core::models::ids::Slot;
use std::collections::HashSet;

impl SimulationState {
    /// Verifies the rank-local invariants of the decomposition.
    ///
    /// Checks that every real particle has a periodic coordinate inside the box and lies in
    /// this rank's domain wherever a neighbour owns the space beyond the face, that no id is
    /// real twice, that the lookup table points every real particle at its slot, and that every
    /// lookup entry names the particle actually stored there.
    pub fn check_consistency(&self) -> Result<(), EngineError> {
        let rank = self.rank;
        let lengths = self.geometry.lengths();
        let neighbors = self.process_grid.neighbors(rank, &self.geometry);
        let mut seen = HashSet::new();

        for (cell, contents) in self.inner_cells() {
            for (i, particle) in contents.particles.iter().enumerate() {
                for axis in (0..3).filter(|&axis| self.geometry.is_periodic(axis)) {
                    let x = particle.position[axis];
                    if !(0.0..lengths[axis]).contains(&x) {
                        return Err(EngineError::violation(
                            rank,
                            format!(
                                "particle {} has coordinate {x} outside [0, {}) on periodic axis {axis}",
                                particle.id, lengths[axis]
                            ),
                        ));
                    }
                }
                for axis in 0..3 {
                    let x = particle.position[axis];
                    let below = x < self.domain.lower[axis] && neighbors[2 * axis].is_some();
                    let above = x >= self.domain.upper[axis] && neighbors[2 * axis + 1].is_some();
                    if below || above {
                        return Err(EngineError::violation(
                            rank,
                            format!(
                                "particle {} has coordinate {x} outside the domain [{}, {}) on axis {axis}",
                                particle.id, self.domain.lower[axis], self.domain.upper[axis]
                            ),
                        ));
                    }
                }
                if !seen.insert(particle.id) {
                    return Err(EngineError::violation(
                        rank,
                        format!("particle {} is real in more than one slot", particle.id),
                    ));
                }
                if self.index.get(particle.id) != Some(Slot::new(cell, i)) {
                    return Err(EngineError::violation(
                        rank,
                        format!(
                            "lookup entry of particle {} does not point at cell {cell} slot {i}",
                            particle.id
                        ),
                    ));
                }
            }
        }

        for (id, slot) in self.index.iter() {
            let stored = self
                .cells
                .get(slot.cell)
                .and_then(|cell| cell.particles.get(slot.index));
            if stored.map(|particle| particle.id) != Some(id) {
                return Err(EngineError::violation(
                    rank,
                    format!("lookup entry of particle {id} points at {slot:?}, which holds another particle"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::geometry::BoxGeometry;
    use crate::core::models::ids::ParticleId;
    use crate::core::models::particle::Particle;
    use crate::core::models::process_grid::ProcessGrid;
    use crate::engine::config::DecompositionConfigBuilder;
    use nalgebra::Point3;

    fn state_with_particles() -> SimulationState {
        let config = DecompositionConfigBuilder::new().cutoff(1.0).skin(0.2).build().unwrap();
        let mut state = SimulationState::new(
            0,
            config,
            BoxGeometry::cube(6.0).unwrap(),
            ProcessGrid::new([1, 1, 1]).unwrap(),
        )
        .unwrap();
        for id in 0..5 {
            let x = 0.5 + id as f64;
            state.insert_particle(Particle::new(id, Point3::new(x, x, 3.0))).unwrap();
        }
        state
    }

    #[test]
    fn consistent_state_passes() {
        state_with_particles().check_consistency().unwrap();
    }

    #[test]
    fn escaped_periodic_coordinate_is_reported() {
        let mut state = state_with_particles();
        state.particle_mut(ParticleId(2)).unwrap().position.z = 6.5;
        let err = state.check_consistency().unwrap_err();
        assert!(err.to_string().contains("periodic axis 2"));
    }

    #[test]
    fn real_particle_in_a_neighbour_domain_is_reported() {
        let config = DecompositionConfigBuilder::new().cutoff(1.0).skin(0.2).build().unwrap();
        let mut state = SimulationState::new(
            0,
            config,
            BoxGeometry::cube(6.0).unwrap(),
            ProcessGrid::new([2, 1, 1]).unwrap(),
        )
        .unwrap();
        let id = state
            .insert_particle(Particle::new(1, Point3::new(1.0, 3.0, 3.0)))
            .unwrap();
        state.check_consistency().unwrap();

        state.particle_mut(id).unwrap().position.x = 4.0;
        let err = state.check_consistency().unwrap_err();
        assert!(err.to_string().contains("outside the domain [0, 3) on axis 0"));
    }

    #[test]
    fn stale_lookup_entry_is_reported() {
        let mut state = state_with_particles();
        let slot = state.index.get(ParticleId(1)).unwrap();
        state.index.insert(ParticleId(3), slot);
        assert!(matches!(
            state.check_consistency(),
            Err(EngineError::ConsistencyViolation { rank: 0, .. })
        ));
    }
}
