//! # Engine Module
//!
//! The stateful protocols that keep all ranks consistent from step to step.
//!
//! - **State** ([`state`]) - The explicit per-rank `SimulationState` and its lifecycle
//! - **Lookup** ([`lookup`]) - Identity lookup from particle id to cell slot
//! - **Migration** ([`migration`]) - Ownership transfer of real particles between ranks
//! - **Ghosts** ([`ghosts`]) - Building, refreshing and force-collecting the halo replicas
//! - **Configuration** ([`config`]) - Cell sizing and strictness settings
//! - **Error Handling** ([`error`]) - Engine errors, always naming the failing rank
//!
//! Every protocol walks the six directions in the same order on every rank; migration always
//! completes before the ghost layer is rebuilt.

mod checks;
pub mod config;
pub mod error;
pub mod ghosts;
pub mod lookup;
pub mod migration;
pub mod state;
