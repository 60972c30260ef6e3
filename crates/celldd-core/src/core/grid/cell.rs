use crate::core::models::particle::Particle;

/// Candidate interaction pairs between a cell and one of its neighbours, stored as indices
/// into the two cells' particle lists. Filled by the neighbour-list stage and reused across
/// steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairList {
    pairs: Vec<(usize, usize)>,
}

impl PairList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, own: usize, neighbor: usize) {
        self.pairs.push((own, neighbor));
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pairs.iter().copied()
    }
}

/// One entry of an upper-half neighbour list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborEntry {
    /// Linear index of the neighbour cell; equal to the owner for the self entry.
    pub cell: usize,
    pub pairs: PairList,
}

impl NeighborEntry {
    pub fn new(cell: usize) -> Self {
        Self {
            cell,
            pairs: PairList::new(),
        }
    }
}

/// A link cell: its particles and, for inner cells, the upper-half neighbour list.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub particles: Vec<Particle>,
    pub neighbors: Vec<NeighborEntry>,
}

impl Cell {
    pub fn with_neighbors(neighbors: &[usize]) -> Self {
        Self {
            particles: Vec::new(),
            neighbors: neighbors.iter().copied().map(NeighborEntry::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_list_collects_and_clears() {
        let mut pairs = PairList::new();
        pairs.push(0, 2);
        pairs.push(1, 1);
        assert_eq!(pairs.iter().collect::<Vec<_>>(), vec![(0, 2), (1, 1)]);
        pairs.clear();
        assert!(pairs.is_empty());
    }

    #[test]
    fn cell_starts_with_empty_pair_buffers() {
        let cell = Cell::with_neighbors(&[5, 6, 9]);
        assert!(cell.is_empty());
        assert_eq!(cell.neighbors.len(), 3);
        assert!(cell.neighbors.iter().all(|entry| entry.pairs.is_empty()));
        assert_eq!(cell.neighbors[2].cell, 9);
    }
}
