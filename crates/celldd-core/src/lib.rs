//! # celldd Core Library
//!
//! Link-cell spatial decomposition for parallel particle simulations. Space is split into
//! one rectangular domain per worker ("rank"); every domain is bucketed into cells sized to
//! the interaction range and wrapped in a one-cell halo holding read-only replicas of the
//! neighbours' boundary particles.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered architecture so that every layer can be tested on its own.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Particle`, `Bond`, `GhostRecord`),
//!   the global box and process grid, and the `CellGrid` that maps positions to cells.
//!
//! - **[`comm`]: The Plumbing.** The `Transport` seam, an in-memory channel transport, the
//!   pairwise even/odd `Communicator` exchange and the little-endian wire codec.
//!
//! - **[`engine`]: The Protocols.** The explicit `SimulationState` of one rank together with
//!   the particle migration and ghost synchronization protocols that keep ranks consistent.
//!
//! - **[`workflows`]: The Public API.** Per-step orchestration and the interaction view
//!   consumed by integrators and force kernels.

pub mod comm;
pub mod core;
pub mod engine;
pub mod workflows;
