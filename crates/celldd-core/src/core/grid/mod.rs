//! # Cell Grid Module
//!
//! Buckets a rank's domain into link cells no smaller than the interaction range, surrounded
//! by one halo layer per face.
//!
//! - [`cell_grid`] - Sizing under a cell budget, position lookup, neighbour lists, sub-grids
//! - [`cell`] - Per-cell particle storage and reusable pair buffers

pub mod cell;
pub mod cell_grid;
