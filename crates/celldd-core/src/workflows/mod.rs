//! # Workflows Module
//!
//! The per-step entry points an integrator drives: bring the decomposition up to date,
//! hand the cells to a force kernel, return ghost forces to their owners.
//!
//! - **Step** ([`step`]) - `prepare_step`, `compute_forces` and global counts
//! - **Interaction** ([`interaction`]) - The view force kernels work through

pub mod interaction;
pub mod step;
