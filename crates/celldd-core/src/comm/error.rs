use super::transport::Tag;
use crate::core::models::ids::Rank;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error("Peer rank {peer} disconnected")]
    Disconnected { peer: Rank },

    #[error("Rank {peer} is not part of a communicator of size {size}")]
    UnknownPeer { peer: Rank, size: usize },

    #[error("Expected a {expected:?} message from rank {peer}, received {found:?}")]
    TagMismatch { peer: Rank, expected: Tag, found: Tag },

    #[error("Malformed {tag:?} frame: {detail}")]
    MalformedFrame { tag: Tag, detail: String },

    #[error("Transport spans {transport} rank(s), process grid spans {grid}")]
    SizeMismatch { transport: usize, grid: usize },
}
