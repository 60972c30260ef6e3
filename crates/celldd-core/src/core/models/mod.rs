//! # Core Models Module
//!
//! Data structures describing what is being decomposed and how.
//!
//! - [`ids`] - Particle identifiers, rank numbers and cell slots
//! - [`particle`] - Particles, bonds and the reduced ghost record
//! - [`geometry`] - The global box and a rank's half-open domain
//! - [`process_grid`] - The 3-D grid of ranks, neighbour ranks and boundary signs

pub mod geometry;
pub mod ids;
pub mod particle;
pub mod process_grid;
