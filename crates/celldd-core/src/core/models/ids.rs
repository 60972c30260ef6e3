use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique particle identifier, stable across migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub u64);

impl fmt::Display for ParticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ParticleId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Index of a worker in the process grid.
pub type Rank = usize;

/// Location of a locally resident particle: the cell index and the position inside the
/// cell's particle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub cell: usize,
    pub index: usize,
}

impl Slot {
    pub fn new(cell: usize, index: usize) -> Self {
        Self { cell, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn particle_id_displays_with_hash_prefix() {
        assert_eq!(ParticleId(42).to_string(), "#42");
    }

    #[test]
    fn particle_ids_order_by_value() {
        let mut ids = vec![ParticleId(3), ParticleId(1), ParticleId::from(2)];
        ids.sort();
        assert_eq!(ids, vec![ParticleId(1), ParticleId(2), ParticleId(3)]);
    }
}
