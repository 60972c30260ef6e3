use super::ids::ParticleId;
use nalgebra::{Point3, Vector3};

/// A bonded interaction between a particle and one or more partners.
///
/// Partners are referenced by their global identifier and resolved through the rank-local
/// lookup table, so a bond stays valid while either side migrates between ranks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    /// Interaction type tag understood by the bonded force kernel.
    pub bond_type: u32,
    /// Global identifiers of the bond partners.
    pub partners: Vec<ParticleId>,
}

impl Bond {
    pub fn new(bond_type: u32, partners: Vec<ParticleId>) -> Self {
        Self {
            bond_type,
            partners,
        }
    }
}

/// A simulated particle.
///
/// Exactly one rank holds the real copy of a particle, in exactly one inner cell. Other ranks
/// may hold ghost replicas in their halo cells; those are built from a [`GhostRecord`] and
/// carry only identity, type, position and a force accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// The global identifier of the particle.
    pub id: ParticleId,
    /// The position in the global box frame. Ghost positions are unfolded into the frame of
    /// the receiving rank.
    pub position: Point3<f64>,
    /// Number of periodic box crossings per axis.
    pub image: [i32; 3],
    /// The velocity of the particle.
    pub velocity: Vector3<f64>,
    /// Force accumulator populated by force kernels.
    pub force: Vector3<f64>,
    /// Bonds owned by this particle.
    pub bonds: Vec<Bond>,
    /// Interaction type of the particle.
    pub type_id: u32,
    pub mass: f64,
    pub charge: f64,
}

impl Particle {
    /// Creates a resting, unbonded particle of type 0 with unit mass.
    ///
    /// # Arguments
    ///
    /// * `id` - The global identifier.
    /// * `position` - The initial position.
    pub fn new(id: impl Into<ParticleId>, position: Point3<f64>) -> Self {
        Self {
            id: id.into(),
            position,
            image: [0; 3],
            velocity: Vector3::zeros(),
            force: Vector3::zeros(),
            bonds: Vec::new(),
            type_id: 0,
            mass: 1.0,
            charge: 0.0,
        }
    }

    pub fn with_type(mut self, type_id: u32) -> Self {
        self.type_id = type_id;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector3<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_bond(mut self, bond: Bond) -> Self {
        self.bonds.push(bond);
        self
    }

    /// Builds a ghost replica from a received record.
    pub fn ghost(record: &GhostRecord) -> Self {
        Self {
            type_id: record.type_id,
            ..Self::new(record.id, record.position)
        }
    }

    /// Returns the reduced representation sent to neighbouring ranks.
    pub fn reduced(&self) -> GhostRecord {
        GhostRecord {
            id: self.id,
            type_id: self.type_id,
            position: self.position,
        }
    }

    /// Iterates over the identifiers of all bond partners of this particle.
    pub fn bond_partners(&self) -> impl Iterator<Item = ParticleId> + '_ {
        self.bonds.iter().flat_map(|bond| bond.partners.iter().copied())
    }

    /// Returns the position with the periodic image counters applied.
    ///
    /// # Arguments
    ///
    /// * `box_lengths` - The global box lengths.
    ///
    /// # Return
    ///
    /// The position in the unwrapped frame, as if no periodic folding had ever happened.
    pub fn unfolded_position(&self, box_lengths: &Vector3<f64>) -> Point3<f64> {
        Point3::new(
            self.position.x + f64::from(self.image[0]) * box_lengths.x,
            self.position.y + f64::from(self.image[1]) * box_lengths.y,
            self.position.z + f64::from(self.image[2]) * box_lengths.z,
        )
    }
}

/// Reduced particle transmitted when building the ghost layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhostRecord {
    pub id: ParticleId,
    pub type_id: u32,
    pub position: Point3<f64>,
}
