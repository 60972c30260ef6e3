use super::error::CommError;
use crate::core::models::ids::Rank;

/// Message class, checked on receipt to catch protocol drift between ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Particles,
    Ghosts,
    Positions,
    Forces,
    Reduce,
}

/// Blocking, ordered, tagged point-to-point messaging between ranks.
///
/// Messages between a given pair of ranks arrive in the order they were sent. A `recv` whose
/// next message carries a different tag fails with [`CommError::TagMismatch`].
pub trait Transport: Send {
    fn rank(&self) -> Rank;

    fn size(&self) -> usize;

    fn send(&self, to: Rank, tag: Tag, payload: Vec<u8>) -> Result<(), CommError>;

    fn recv(&self, from: Rank, tag: Tag) -> Result<Vec<u8>, CommError>;
}
