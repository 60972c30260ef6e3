//! # Core Module
//!
//! Stateless building blocks of the decomposition: particles and their identifiers, the
//! global box and the grid of ranks tiling it, and the per-rank link-cell grid.
//!
//! - **Data Models** ([`models`]) - Particles, bonds, ghost records, box geometry, process grid
//! - **Cell Grid** ([`grid`]) - Cell sizing, position lookup and upper-half neighbour lists
//! - **Utilities** ([`utils`]) - Periodic folding helpers

pub mod grid;
pub mod models;
pub mod utils;
