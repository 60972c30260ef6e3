use super::codec;
use super::direction::Direction;
use super::error::CommError;
use super::transport::{Tag, Transport};
use crate::core::models::geometry::BoxGeometry;
use crate::core::models::ids::Rank;
use crate::core::models::process_grid::ProcessGrid;
use tracing::trace;

/// How a directional exchange reaches its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeRoute {
    /// Send to the face neighbour and receive from the opposite one. Either side is absent on
    /// a non-periodic face of the global box.
    Remote {
        send_to: Option<Rank>,
        recv_from: Option<Rank>,
    },
    /// The rank is its own neighbour; outgoing and incoming buffers are swapped.
    LocalAlias,
}

impl ExchangeRoute {
    fn between(rank: Rank, send_to: Option<Rank>, recv_from: Option<Rank>) -> Self {
        if send_to == Some(rank) {
            ExchangeRoute::LocalAlias
        } else {
            ExchangeRoute::Remote { send_to, recv_from }
        }
    }

    /// Whether data sent in this direction reaches anyone.
    pub fn sends(&self) -> bool {
        matches!(
            self,
            ExchangeRoute::LocalAlias
                | ExchangeRoute::Remote {
                    send_to: Some(_),
                    ..
                }
        )
    }
}

/// A count header plus a payload, the unit of every directional exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub counts: Vec<u64>,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn clear(&mut self) {
        self.counts.clear();
        self.payload.clear();
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// A rank's view of its face neighbours over a [`Transport`].
#[derive(Debug)]
pub struct Communicator<T: Transport> {
    transport: T,
    routes: [ExchangeRoute; 6],
    position: [usize; 3],
}

impl<T: Transport> Communicator<T> {
    /// Derives the six routes of the transport's rank from the process grid.
    ///
    /// # Errors
    ///
    /// Returns [`CommError::SizeMismatch`] if the transport and the grid disagree on the
    /// number of ranks.
    pub fn new(
        transport: T,
        grid: &ProcessGrid,
        geometry: &BoxGeometry,
    ) -> Result<Self, CommError> {
        if transport.size() != grid.size() {
            return Err(CommError::SizeMismatch {
                transport: transport.size(),
                grid: grid.size(),
            });
        }
        let rank = transport.rank();
        let neighbors = grid.neighbors(rank, geometry);
        let routes = std::array::from_fn(|i| {
            let opposite = Direction::ALL[i].opposite().index();
            ExchangeRoute::between(rank, neighbors[i], neighbors[opposite])
        });
        Ok(Self::from_routes(transport, routes, grid.position_of(rank)))
    }

    /// Builds a communicator from explicit routes and the rank's process-grid position.
    pub fn from_routes(transport: T, routes: [ExchangeRoute; 6], position: [usize; 3]) -> Self {
        Self {
            transport,
            routes,
            position,
        }
    }

    pub fn rank(&self) -> Rank {
        self.transport.rank()
    }

    pub fn size(&self) -> usize {
        self.transport.size()
    }

    pub fn route(&self, dir: Direction) -> ExchangeRoute {
        self.routes[dir.index()]
    }

    /// Sends `outgoing` towards `dir` and fills `incoming` from the opposite neighbour.
    ///
    /// Ranks at an even position along the axis send first and then receive; odd ranks do the
    /// reverse, so chains and rings of blocking sends never wait on each other. The header
    /// (`counts`) travels as its own message ahead of the payload. The outgoing payload is
    /// consumed.
    pub fn exchange(
        &self,
        dir: Direction,
        tag: Tag,
        outgoing: &mut Frame,
        incoming: &mut Frame,
    ) -> Result<(), CommError> {
        let (send_to, recv_from) = match self.routes[dir.index()] {
            ExchangeRoute::LocalAlias => {
                std::mem::swap(outgoing, incoming);
                return Ok(());
            }
            ExchangeRoute::Remote { send_to, recv_from } => (send_to, recv_from),
        };

        incoming.clear();
        let position = self.position[dir.axis()];
        for phase in 0..2 {
            if (position + phase) % 2 == 0 {
                if let Some(peer) = send_to {
                    trace!(?dir, peer, items = outgoing.total(), "Sending frame.");
                    self.transport
                        .send(peer, tag, codec::encode_counts(&outgoing.counts))?;
                    self.transport
                        .send(peer, tag, std::mem::take(&mut outgoing.payload))?;
                }
            } else if let Some(peer) = recv_from {
                let header = self.transport.recv(peer, tag)?;
                incoming.counts = codec::decode_counts(tag, &header)?;
                incoming.payload = self.transport.recv(peer, tag)?;
                trace!(?dir, peer, items = incoming.total(), "Received frame.");
            }
        }
        Ok(())
    }

    /// Sums `value` over all ranks; every rank receives the total.
    pub fn all_reduce_sum(&self, value: u64) -> Result<u64, CommError> {
        let size = self.size();
        if size == 1 {
            return Ok(value);
        }
        if self.rank() == 0 {
            let mut total = value;
            for peer in 1..size {
                total += self.recv_word(peer)?;
            }
            for peer in 1..size {
                self.transport
                    .send(peer, Tag::Reduce, codec::encode_counts(&[total]))?;
            }
            Ok(total)
        } else {
            self.transport
                .send(0, Tag::Reduce, codec::encode_counts(&[value]))?;
            self.recv_word(0)
        }
    }

    fn recv_word(&self, peer: Rank) -> Result<u64, CommError> {
        let bytes = self.transport.recv(peer, Tag::Reduce)?;
        match codec::decode_counts(Tag::Reduce, &bytes)?.as_slice() {
            [word] => Ok(*word),
            words => Err(CommError::MalformedFrame {
                tag: Tag::Reduce,
                detail: format!("expected one word, got {}", words.len()),
            }),
        }
    }
}
