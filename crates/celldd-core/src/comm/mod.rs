//! # Communication Module
//!
//! Point-to-point plumbing between ranks. Every protocol in the engine talks to its face
//! neighbours through a [`exchange::Communicator`], which schedules sends and receives in
//! even/odd phases over any [`transport::Transport`].
//!
//! - [`direction`] - The six face directions and their fixed processing order
//! - [`transport`] - The blocking, tagged transport seam
//! - [`channel`] - In-memory transport over crossbeam channels, one worker thread per rank
//! - [`exchange`] - Neighbour routes, directional exchange and reductions
//! - [`codec`] - Little-endian wire layout of particles, ghost records and vectors
//! - [`error`] - Transport and codec errors

pub mod channel;
pub mod codec;
pub mod direction;
pub mod error;
pub mod exchange;
pub mod transport;
