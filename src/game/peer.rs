//! Network peers
//!
//! A [`Peer`] is owned by exactly one player. It records which entities'
//! observer sets it has joined so despawn can undo every registration.
//! [`PeerHandle`] is the cheap cloneable send half, held by pane callbacks.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::trace;

use crate::game::entity::NetworkId;
use crate::net::session::Session;
use crate::protocol::packet::ServerPacket;

/// Send half of a peer
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: NetworkId,
    session: Arc<Session>,
}

impl PeerHandle {
    pub fn new(id: NetworkId, session: Arc<Session>) -> Self {
        Self { id, session }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Push a packet to the client.
    ///
    /// Fire-and-forget: returns whether the packet was queued. Sends to a
    /// session that is already going away are skipped.
    pub fn send<P: ServerPacket>(&self, packet: &P) -> bool {
        if !self.session.is_active() {
            trace!(
                network_id = %self.id,
                opcode = P::opcode(),
                "Peer inactive, packet skipped"
            );
            return false;
        }
        self.session.send_packet(packet)
    }
}

/// A player's network peer
#[derive(Debug)]
pub struct Peer {
    handle: PeerHandle,
    /// Entities whose observer sets this peer is in
    joined: BTreeSet<NetworkId>,
}

impl Peer {
    pub fn new(handle: PeerHandle) -> Self {
        Self {
            handle,
            joined: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> NetworkId {
        self.handle.id()
    }

    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    pub fn send<P: ServerPacket>(&self, packet: &P) -> bool {
        self.handle.send(packet)
    }

    /// Record joining an entity's observer set
    pub fn join(&mut self, entity: NetworkId) -> bool {
        self.joined.insert(entity)
    }

    /// Record leaving an entity's observer set
    pub fn leave(&mut self, entity: NetworkId) -> bool {
        self.joined.remove(&entity)
    }

    pub fn has_joined(&self, entity: NetworkId) -> bool {
        self.joined.contains(&entity)
    }

    pub fn joined(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.joined.iter().copied()
    }

    /// Forget every joined entity, returning them
    pub fn take_joined(&mut self) -> BTreeSet<NetworkId> {
        std::mem::take(&mut self.joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::session::SessionState;
    use crate::protocol::server::RemoveEntityPacket;
    use tokio::sync::mpsc;

    fn handle() -> (PeerHandle, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(4);
        let session = Arc::new(Session::with_channel(
            9,
            "127.0.0.1:4000".parse().unwrap(),
            false,
            tx,
        ));
        (PeerHandle::new(NetworkId(3), session), rx)
    }

    #[test]
    fn test_send_queues_packet() {
        let (handle, mut rx) = handle();
        assert!(handle.send(&RemoveEntityPacket { entity_id: 1 }));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_inactive_session_is_skipped() {
        let (handle, mut rx) = handle();
        handle.session().set_state(SessionState::Disconnecting);
        assert!(!handle.send(&RemoveEntityPacket { entity_id: 1 }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_joined_bookkeeping() {
        let (handle, _rx) = handle();
        let mut peer = Peer::new(handle);
        assert_eq!(peer.id(), NetworkId(3));

        assert!(peer.join(NetworkId(5)));
        assert!(!peer.join(NetworkId(5)));
        assert!(peer.has_joined(NetworkId(5)));

        assert!(peer.leave(NetworkId(5)));
        assert!(!peer.leave(NetworkId(5)));

        peer.join(NetworkId(1));
        peer.join(NetworkId(2));
        assert_eq!(peer.take_joined().len(), 2);
        assert_eq!(peer.joined().count(), 0);
    }
}
