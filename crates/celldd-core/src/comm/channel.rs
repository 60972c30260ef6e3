use super::error::CommError;
use super::transport::{Tag, Transport};
use crate::core::models::ids::Rank;
use crossbeam_channel::{Receiver, Sender};
use tracing::trace;

#[derive(Debug)]
struct Envelope {
    tag: Tag,
    payload: Vec<u8>,
}

/// In-memory transport connecting ranks that run as threads of one process.
///
/// Every ordered pair of ranks gets its own FIFO channel, so messages between two ranks never
/// overtake each other and are never mixed with traffic from a third rank. Dropping a
/// transport disconnects it: peers blocked on it fail with [`CommError::Disconnected`].
#[derive(Debug)]
pub struct ChannelTransport {
    rank: Rank,
    outboxes: Vec<Sender<Envelope>>,
    inboxes: Vec<Receiver<Envelope>>,
}

impl ChannelTransport {
    /// Builds `n` fully connected transports with unbounded buffering.
    pub fn mesh(n: usize) -> Vec<Self> {
        Self::build(n, None)
    }

    /// Builds `n` fully connected transports over rendezvous channels: every send blocks until
    /// the peer receives it.
    pub fn synchronous_mesh(n: usize) -> Vec<Self> {
        Self::build(n, Some(0))
    }

    fn build(n: usize, capacity: Option<usize>) -> Vec<Self> {
        let mut outboxes: Vec<Vec<Sender<Envelope>>> = (0..n).map(|_| Vec::with_capacity(n)).collect();
        let mut inboxes: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();

        for (src, outbox) in outboxes.iter_mut().enumerate() {
            for inbox in inboxes.iter_mut() {
                let (tx, rx) = match capacity {
                    Some(cap) => crossbeam_channel::bounded(cap),
                    None => crossbeam_channel::unbounded(),
                };
                outbox.push(tx);
                inbox[src] = Some(rx);
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| Self {
                rank,
                outboxes,
                inboxes: inboxes.into_iter().flatten().collect(),
            })
            .collect()
    }

    fn check_peer(&self, peer: Rank) -> Result<(), CommError> {
        if peer >= self.outboxes.len() {
            return Err(CommError::UnknownPeer {
                peer,
                size: self.outboxes.len(),
            });
        }
        Ok(())
    }
}

impl Transport for ChannelTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn send(&self, to: Rank, tag: Tag, payload: Vec<u8>) -> Result<(), CommError> {
        self.check_peer(to)?;
        trace!(from = self.rank, to, ?tag, bytes = payload.len(), "send");
        self.outboxes[to]
            .send(Envelope { tag, payload })
            .map_err(|_| CommError::Disconnected { peer: to })
    }

    fn recv(&self, from: Rank, tag: Tag) -> Result<Vec<u8>, CommError> {
        self.check_peer(from)?;
        let envelope = self.inboxes[from]
            .recv()
            .map_err(|_| CommError::Disconnected { peer: from })?;
        if envelope.tag != tag {
            return Err(CommError::TagMismatch {
                peer: from,
                expected: tag,
                found: envelope.tag,
            });
        }
        trace!(to = self.rank, from, ?tag, bytes = envelope.payload.len(), "recv");
        Ok(envelope.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn messages_between_a_pair_stay_ordered() {
        let mut mesh = ChannelTransport::mesh(2);
        let b = mesh.pop().unwrap();
        let a = mesh.pop().unwrap();
        a.send(1, Tag::Particles, vec![1]).unwrap();
        a.send(1, Tag::Particles, vec![2]).unwrap();
        assert_eq!(b.recv(0, Tag::Particles).unwrap(), vec![1]);
        assert_eq!(b.recv(0, Tag::Particles).unwrap(), vec![2]);
        assert_eq!((a.rank(), b.rank(), a.size()), (0, 1, 2));
    }

    #[test]
    fn tag_mismatch_is_reported() {
        let mut mesh = ChannelTransport::mesh(2);
        let b = mesh.pop().unwrap();
        let a = mesh.pop().unwrap();
        a.send(1, Tag::Ghosts, Vec::new()).unwrap();
        let err = b.recv(0, Tag::Forces).unwrap_err();
        assert_eq!(
            err,
            CommError::TagMismatch {
                peer: 0,
                expected: Tag::Forces,
                found: Tag::Ghosts
            }
        );
    }

    #[test]
    fn dropped_peer_disconnects() {
        let mut mesh = ChannelTransport::mesh(2);
        let b = mesh.pop().unwrap();
        drop(mesh);
        assert_eq!(b.recv(0, Tag::Reduce), Err(CommError::Disconnected { peer: 0 }));
        assert_eq!(
            b.send(0, Tag::Reduce, Vec::new()),
            Err(CommError::Disconnected { peer: 0 })
        );
    }

    #[test]
    fn unknown_peer_is_rejected() {
        let mesh = ChannelTransport::mesh(1);
        assert!(matches!(
            mesh[0].send(3, Tag::Reduce, Vec::new()),
            Err(CommError::UnknownPeer { peer: 3, size: 1 })
        ));
    }

    #[test]
    fn synchronous_send_blocks_until_received() {
        let mut mesh = ChannelTransport::synchronous_mesh(2);
        let b = mesh.pop().unwrap();
        let a = mesh.pop().unwrap();
        let sender = thread::spawn(move || a.send(1, Tag::Positions, vec![9, 9]));
        assert_eq!(b.recv(0, Tag::Positions).unwrap(), vec![9, 9]);
        sender.join().unwrap().unwrap();
    }
}
