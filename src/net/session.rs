//! Session management module
//!
//! Manages client sessions including:
//! - Session lifecycle (creation, tracking, cleanup)
//! - Session state machine (version -> server selection -> redirect, or
//!   version -> in world on the world listener)
//! - Per-session seed/key material and the payload cipher it keys
//! - Fire-and-forget outbound packet queueing
//! - Thread-safe session registry

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::crypto::{PacketCipher, SessionKey};
use crate::error::{NetworkError, ProtocolError, Result, WorldsyncError};
use crate::game::entity::NetworkId;
use crate::net::frame::Frame;
use crate::protocol::packet::ServerPacket;

/// Unique session identifier
pub type SessionId = u64;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Banner sent, waiting for the client's version packet
    AwaitingVersion,
    /// Version accepted by the gateway, waiting for a table request
    AwaitingServerSelection,
    /// Version accepted by the world listener, player spawned
    InWorld,
    /// Client was pointed at another server; the connection closes
    Redirected,
    /// Session is disconnecting
    Disconnecting,
    /// Session has been disconnected
    Disconnected,
}

impl SessionState {
    /// Check if the session is still active
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            SessionState::Redirected | SessionState::Disconnecting | SessionState::Disconnected
        )
    }

    /// Check if the handshake has not finished yet
    pub fn is_handshaking(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingVersion | SessionState::AwaitingServerSelection
        )
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::AwaitingVersion => "AwaitingVersion",
            SessionState::AwaitingServerSelection => "AwaitingServerSelection",
            SessionState::InWorld => "InWorld",
            SessionState::Redirected => "Redirected",
            SessionState::Disconnecting => "Disconnecting",
            SessionState::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

struct CipherState {
    cipher: PacketCipher,
    next_ordinal: u8,
}

/// A connected client session
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Whether this is a WebSocket connection
    pub is_websocket: bool,
    /// Current session state
    state: RwLock<SessionState>,
    /// Seed and key sent in the connection info packet
    key: SessionKey,
    /// Payload cipher, active once the world handshake succeeds
    cipher: Mutex<Option<CipherState>>,
    /// Network id of the entity this session drives
    network_id: RwLock<Option<NetworkId>>,
    /// Time of session creation
    pub created_at: Instant,
    /// Outbound frame channel, drained by the connection task
    outbound_tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl Session {
    /// Create a new session
    pub fn new(id: SessionId, address: SocketAddr, is_websocket: bool) -> Self {
        Self {
            id,
            address,
            is_websocket,
            state: RwLock::new(SessionState::AwaitingVersion),
            key: SessionKey::generate(),
            cipher: Mutex::new(None),
            network_id: RwLock::new(None),
            created_at: Instant::now(),
            outbound_tx: None,
        }
    }

    /// Create a new session with an outbound channel
    pub fn with_channel(
        id: SessionId,
        address: SocketAddr,
        is_websocket: bool,
        outbound_tx: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        let mut session = Self::new(id, address, is_websocket);
        session.outbound_tx = Some(outbound_tx);
        session
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Set the session state
    pub fn set_state(&self, new_state: SessionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        debug!(
            session_id = self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Seed and key for this session
    pub fn session_key(&self) -> &SessionKey {
        &self.key
    }

    /// Start obfuscating payloads with this session's seed and key
    pub fn enable_cipher(&self) -> std::result::Result<(), ProtocolError> {
        let cipher = self.key.cipher()?;
        *self.cipher.lock() = Some(CipherState {
            cipher,
            next_ordinal: 0,
        });
        debug!(session_id = self.id, seed = self.key.seed, "Session cipher enabled");
        Ok(())
    }

    /// Whether frames to and from this session carry an ordinal
    pub fn cipher_enabled(&self) -> bool {
        self.cipher.lock().is_some()
    }

    /// Decrypt an inbound frame's payload in place
    pub fn open_frame(&self, frame: &mut Frame) {
        if let Some(ordinal) = frame.ordinal {
            if let Some(state) = self.cipher.lock().as_ref() {
                state.cipher.apply(&mut frame.payload, ordinal);
            }
        }
    }

    /// Get the network id of the entity this session drives
    pub fn network_id(&self) -> Option<NetworkId> {
        *self.network_id.read()
    }

    /// Bind this session to an entity
    pub fn set_network_id(&self, id: NetworkId) {
        *self.network_id.write() = Some(id);
    }

    /// Forget the bound entity, returning it
    pub fn take_network_id(&self) -> Option<NetworkId> {
        self.network_id.write().take()
    }

    /// Encode a packet into a frame for this session
    fn frame_packet<P: ServerPacket>(&self, packet: &P) -> std::result::Result<Vec<u8>, ProtocolError> {
        let mut payload = packet.to_payload().into_vec();
        let frame = match self.cipher.lock().as_mut() {
            Some(state) => {
                let ordinal = state.next_ordinal;
                state.next_ordinal = state.next_ordinal.wrapping_add(1);
                state.cipher.apply(&mut payload, ordinal);
                Frame::encrypted(P::opcode(), ordinal, payload)
            }
            None => Frame::plain(P::opcode(), payload),
        };
        frame.encode()
    }

    /// Queue a packet for this client.
    ///
    /// Never fails from the caller's point of view. A closed channel drops
    /// the packet. A full one marks the session as disconnecting, since a
    /// client that skipped a packet can no longer be kept in sync; the
    /// connection task closes it after flushing what was queued.
    pub fn send_packet<P: ServerPacket>(&self, packet: &P) -> bool {
        let bytes = match self.frame_packet(packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    session_id = self.id,
                    opcode = P::opcode(),
                    error = %e,
                    "Failed to frame outbound packet"
                );
                return false;
            }
        };

        match self.try_send(bytes) {
            Ok(()) => {
                trace!(session_id = self.id, opcode = P::opcode(), "Packet queued");
                true
            }
            Err(WorldsyncError::Network(NetworkError::WriteBufferFull)) => {
                warn!(
                    session_id = self.id,
                    opcode = P::opcode(),
                    "Outbound queue full, disconnecting"
                );
                self.set_state(SessionState::Disconnecting);
                false
            }
            Err(e) => {
                debug!(
                    session_id = self.id,
                    opcode = P::opcode(),
                    error = %e,
                    "Dropped outbound packet"
                );
                false
            }
        }
    }

    /// Try to send data without blocking
    pub fn try_send(&self, data: Vec<u8>) -> Result<()> {
        match &self.outbound_tx {
            Some(tx) => tx.try_send(data).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WorldsyncError::Network(NetworkError::WriteBufferFull)
                }
                mpsc::error::TrySendError::Closed(_) => {
                    WorldsyncError::Network(NetworkError::ConnectionClosed)
                }
            }),
            None => Err(WorldsyncError::Network(NetworkError::ConnectionClosed)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("is_websocket", &self.is_websocket)
            .field("network_id", &self.network_id())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Registry of live sessions with a per-IP connection cap
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Live sessions per remote IP
    per_ip: DashMap<IpAddr, usize>,
    next_id: AtomicU64,
    max_per_ip: usize,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_limits(10)
    }

    /// Create a session manager with a custom per-IP limit
    pub fn with_limits(max_per_ip: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            per_ip: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_ip,
        }
    }

    /// Reserve a slot for `address` and register the session built for it
    fn admit(
        &self,
        address: SocketAddr,
        build: impl FnOnce(SessionId) -> Session,
    ) -> Result<Arc<Session>> {
        let ip = address.ip();
        {
            let mut count = self.per_ip.entry(ip).or_insert(0);
            if *count >= self.max_per_ip {
                warn!(
                    ip = %ip,
                    count = *count,
                    max = self.max_per_ip,
                    "Connection limit exceeded for IP"
                );
                return Err(NetworkError::TooManyConnections(ip.to_string()).into());
            }
            *count += 1;
        }

        let session = Arc::new(build(self.next_id.fetch_add(1, Ordering::Relaxed)));
        self.sessions.insert(session.id, session.clone());

        info!(
            session_id = session.id,
            address = %session.address,
            is_websocket = session.is_websocket,
            "Session created"
        );
        Ok(session)
    }

    /// Create a session whose packets are queued on `outbound_tx`
    pub fn create_session_with_channel(
        &self,
        address: SocketAddr,
        is_websocket: bool,
        outbound_tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<Arc<Session>> {
        self.admit(address, |id| {
            Session::with_channel(id, address, is_websocket, outbound_tx)
        })
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Drop a session from the registry and release its IP slot
    pub fn remove(&self, id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return;
        };

        let ip = session.address.ip();
        self.per_ip.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });

        info!(
            session_id = id,
            state = %session.state(),
            "Session removed"
        );
    }

    /// Mark a session as disconnecting and drop it from the registry.
    ///
    /// Its connection task notices on the next loop iteration.
    pub fn disconnect(&self, id: SessionId) {
        if let Some(session) = self.get(id) {
            session.set_state(SessionState::Disconnecting);
        }
        self.remove(id);
    }

    pub fn disconnect_all(&self) {
        for id in self.session_ids() {
            self.disconnect(id);
        }
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Live sessions from one IP
    pub fn count_for_ip(&self, ip: IpAddr) -> usize {
        self.per_ip.get(&ip).map(|count| *count).unwrap_or(0)
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|r| *r.key()).collect()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::Packet;
    use crate::protocol::server::{RemoveItemFromPanePacket, UnequipPacket};

    fn test_address() -> SocketAddr {
        "127.0.0.1:12345".parse().unwrap()
    }

    fn register(manager: &SessionManager, address: SocketAddr) -> Result<Arc<Session>> {
        let (tx, _rx) = mpsc::channel(1);
        manager.create_session_with_channel(address, false, tx)
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new(1, test_address(), false);
        assert_eq!(session.id, 1);
        assert_eq!(session.state(), SessionState::AwaitingVersion);
        assert!(session.state().is_handshaking());
        assert!(session.is_active());
        assert!(!session.cipher_enabled());
    }

    #[test]
    fn test_redirected_is_inactive() {
        let session = Session::new(1, test_address(), false);
        session.set_state(SessionState::Redirected);
        assert!(!session.is_active());
        assert!(!session.state().is_handshaking());
    }

    #[test]
    fn test_session_keys_differ() {
        let a = Session::new(1, test_address(), false);
        let b = Session::new(2, test_address(), false);
        assert_ne!(a.session_key().key, b.session_key().key);
    }

    #[test]
    fn test_send_packet_queues_frame() {
        let (tx, mut rx) = mpsc::channel(4);
        let session = Session::with_channel(1, test_address(), false, tx);

        assert!(session.send_packet(&UnequipPacket { slot: 3 }));
        let bytes = rx.try_recv().unwrap();
        assert_eq!(bytes, vec![0xAA, 0x00, 0x02, 0x38, 0x03]);
    }

    #[test]
    fn test_send_packet_never_fails_loudly() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::with_channel(1, test_address(), false, tx);
        drop(rx);
        assert!(!session.send_packet(&UnequipPacket { slot: 3 }));

        let detached = Session::new(2, test_address(), false);
        assert!(!detached.send_packet(&UnequipPacket { slot: 3 }));
    }

    #[test]
    fn test_full_queue_disconnects_session() {
        let (tx, mut rx) = mpsc::channel(1);
        let session = Session::with_channel(1, test_address(), false, tx);
        session.set_state(SessionState::InWorld);

        assert!(session.send_packet(&UnequipPacket { slot: 1 }));
        assert!(!session.send_packet(&UnequipPacket { slot: 2 }));
        assert!(!session.is_active());
        assert_eq!(session.state(), SessionState::Disconnecting);

        // The packet that fit is still delivered
        assert_eq!(rx.try_recv().unwrap(), vec![0xAA, 0x00, 0x02, 0x38, 0x01]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_leaves_state_alone() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::with_channel(1, test_address(), false, tx);
        session.set_state(SessionState::InWorld);
        drop(rx);

        assert!(!session.send_packet(&UnequipPacket { slot: 1 }));
        assert_eq!(session.state(), SessionState::InWorld);
    }

    #[test]
    fn test_cipher_round_trip_through_frames() {
        let (tx, mut rx) = mpsc::channel(4);
        let session = Session::with_channel(1, test_address(), false, tx);
        session.enable_cipher().unwrap();

        session.send_packet(&RemoveItemFromPanePacket { slot: 5 });
        let bytes = rx.try_recv().unwrap();
        let mut frame = Frame::parse_body(&bytes[3..], true).unwrap();
        assert_eq!(frame.ordinal, Some(0));

        session.open_frame(&mut frame);
        assert_eq!(
            RemoveItemFromPanePacket::decode(&frame.payload).unwrap(),
            RemoveItemFromPanePacket { slot: 5 }
        );
    }

    #[test]
    fn test_ordinals_advance() {
        let (tx, mut rx) = mpsc::channel(4);
        let session = Session::with_channel(1, test_address(), false, tx);
        session.enable_cipher().unwrap();

        session.send_packet(&UnequipPacket { slot: 1 });
        session.send_packet(&UnequipPacket { slot: 1 });
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first[4], 0);
        assert_eq!(second[4], 1);
    }

    #[test]
    fn test_network_id_binding() {
        let session = Session::new(1, test_address(), false);
        session.set_network_id(NetworkId(7));
        assert_eq!(session.network_id(), Some(NetworkId(7)));
        assert_eq!(session.take_network_id(), Some(NetworkId(7)));
        assert_eq!(session.network_id(), None);
    }

    #[test]
    fn test_session_manager_create_and_remove() {
        let manager = SessionManager::new();
        let session = register(&manager, test_address()).unwrap();
        let id = session.id;

        assert_eq!(id, 1);
        assert_eq!(manager.count(), 1);
        assert_eq!(manager.get(id).unwrap().id, id);

        manager.remove(id);
        assert!(manager.get(id).is_none());
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn test_session_manager_ip_limit() {
        let manager = SessionManager::with_limits(2);
        let addr1: SocketAddr = "192.168.1.1:12345".parse().unwrap();
        let addr2: SocketAddr = "192.168.1.1:12346".parse().unwrap();
        let addr3: SocketAddr = "192.168.1.1:12347".parse().unwrap();

        assert!(register(&manager, addr1).is_ok());
        assert!(register(&manager, addr2).is_ok());
        assert!(register(&manager, addr3).is_err());
    }

    #[test]
    fn test_ip_slot_released_on_remove() {
        let manager = SessionManager::with_limits(1);
        let addr: SocketAddr = "10.1.1.1:5000".parse().unwrap();

        let first = register(&manager, addr).unwrap();
        assert_eq!(manager.count_for_ip(addr.ip()), 1);
        assert!(register(&manager, addr).is_err());

        manager.remove(first.id);
        assert_eq!(manager.count_for_ip(addr.ip()), 0);
        assert!(register(&manager, addr).is_ok());
    }

    #[test]
    fn test_disconnect_all() {
        let manager = SessionManager::new();
        let session = register(&manager, test_address()).unwrap();
        manager.disconnect_all();
        assert_eq!(manager.count(), 0);
        assert_eq!(session.state(), SessionState::Disconnecting);
    }
}
