use crate::core::grid::cell::Cell;
use crate::core::models::ids::{ParticleId, Slot};
use std::collections::HashMap;

/// Rank-local identity lookup: particle id to its current `(cell, index)` slot.
///
/// Holds an entry for every locally resident particle, real or ghost. A real particle always
/// owns the entry for its id; ghosts only fill entries that are still vacant.
#[derive(Debug, Clone, Default)]
pub struct LocalIndex {
    slots: HashMap<ParticleId, Slot>,
}

impl LocalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ParticleId) -> Option<Slot> {
        self.slots.get(&id).copied()
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Points `id` at `slot`, replacing any previous entry.
    pub fn insert(&mut self, id: ParticleId, slot: Slot) {
        self.slots.insert(id, slot);
    }

    /// Points `id` at `slot` unless an entry exists. Returns whether the entry was added.
    pub fn insert_if_absent(&mut self, id: ParticleId, slot: Slot) -> bool {
        match self.slots.entry(id) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(slot);
                true
            }
        }
    }

    pub fn remove(&mut self, id: ParticleId) -> Option<Slot> {
        self.slots.remove(&id)
    }

    /// Removes the entry of `id` only if it points at `slot`.
    pub fn remove_if_at(&mut self, id: ParticleId, slot: Slot) {
        if self.get(id) == Some(slot) {
            self.slots.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Replaces all entries with the particles of `cells`, indexed in the given order.
    pub fn rebuild<'a>(&mut self, cells: &[Cell], indices: impl IntoIterator<Item = &'a usize>) {
        self.slots.clear();
        for &cell in indices {
            self.index_cell(cells, cell);
        }
    }

    /// Points every particle of `cell` at its current slot.
    pub fn index_cell(&mut self, cells: &[Cell], cell: usize) {
        for (index, particle) in cells[cell].particles.iter().enumerate() {
            self.slots.insert(particle.id, Slot::new(cell, index));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParticleId, Slot)> + '_ {
        self.slots.iter().map(|(&id, &slot)| (id, slot))
    }
}
