//! Connection handshake
//!
//! Both listeners open a connection the same way: send the banner, wait
//! for the client's version, answer with connection info. The connection
//! info carries the session's seed and key whether or not the version
//! matched; a mismatch is reported through the success flag and the
//! session stays where it was until the client or transport closes it.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::net::session::{Session, SessionState};
use crate::protocol::client::VersionPacket;
use crate::protocol::server::{AcceptConnectionPacket, ConnectionInfoPacket};

/// Banner sent to every accepted connection
pub const BANNER: &str = "CONNECTED SERVER\n";

/// Fail with [`ProtocolError::UnexpectedPacket`] unless the session is in `expected`
pub fn require_state(session: &Session, expected: SessionState, opcode: u8) -> Result<()> {
    let state = session.state();
    if state != expected {
        return Err(ProtocolError::UnexpectedPacket {
            state: state.to_string(),
            opcode,
        }
        .into());
    }
    Ok(())
}

/// Version check shared by the gateway and world listeners
#[derive(Debug, Clone)]
pub struct VersionNegotiator {
    expected_version: u16,
    content_version: u32,
}

impl VersionNegotiator {
    pub fn new(expected_version: u16, content_version: u32) -> Self {
        Self {
            expected_version,
            content_version,
        }
    }

    /// Version the client must announce
    pub fn expected_version(&self) -> u16 {
        self.expected_version
    }

    /// Send the connection banner
    pub fn greet(&self, session: &Session) {
        session.send_packet(&AcceptConnectionPacket::new(BANNER));
    }

    /// Answer a version packet with connection info.
    ///
    /// Returns whether the version matched. State transitions are left to
    /// the caller since they differ per listener.
    pub fn negotiate(
        &self,
        session: &Arc<Session>,
        packet: &VersionPacket,
        table_checksum: u32,
    ) -> Result<bool> {
        require_state(session, SessionState::AwaitingVersion, 0x00)?;

        let accepted = packet.version == self.expected_version;
        let key = session.session_key();
        session.send_packet(&ConnectionInfoPacket {
            success: accepted,
            version: self.content_version,
            table_checksum,
            seed: key.seed,
            key: key.key.clone(),
        });

        if accepted {
            debug!(
                session_id = session.id,
                version = packet.version,
                "Client version accepted"
            );
        } else {
            warn!(
                session_id = session.id,
                expected = self.expected_version,
                actual = packet.version,
                "Client version mismatch"
            );
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorldsyncError;
    use crate::net::frame::Frame;
    use crate::protocol::packet::Packet;
    use tokio::sync::mpsc;

    fn session_with_rx() -> (Arc<Session>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::with_channel(1, "127.0.0.1:5000".parse().unwrap(), false, tx);
        (Arc::new(session), rx)
    }

    fn connection_info(bytes: &[u8]) -> ConnectionInfoPacket {
        let frame = Frame::parse_body(&bytes[3..], false).unwrap();
        assert_eq!(frame.opcode, 0x00);
        ConnectionInfoPacket::decode(&frame.payload).unwrap()
    }

    #[test]
    fn test_greet_sends_banner() {
        let (session, mut rx) = session_with_rx();
        VersionNegotiator::new(741, 12).greet(&session);

        let bytes = rx.try_recv().unwrap();
        let frame = Frame::parse_body(&bytes[3..], false).unwrap();
        assert_eq!(frame.opcode, 0x7E);
        let banner = AcceptConnectionPacket::decode(&frame.payload).unwrap();
        assert_eq!(banner.message, "CONNECTED SERVER\n");
    }

    #[test]
    fn test_matching_version() {
        let (session, mut rx) = session_with_rx();
        let negotiator = VersionNegotiator::new(741, 12);

        let accepted = negotiator
            .negotiate(&session, &VersionPacket { version: 741 }, 0x1234)
            .unwrap();
        assert!(accepted);

        let info = connection_info(&rx.try_recv().unwrap());
        assert!(info.success);
        assert_eq!(info.version, 12);
        assert_eq!(info.table_checksum, 0x1234);
        assert_eq!(info.seed, session.session_key().seed);
        assert_eq!(info.key, session.session_key().key);
    }

    #[test]
    fn test_version_mismatch_reports_failure() {
        let (session, mut rx) = session_with_rx();
        let negotiator = VersionNegotiator::new(741, 12);

        let accepted = negotiator
            .negotiate(&session, &VersionPacket { version: 700 }, 0)
            .unwrap();
        assert!(!accepted);
        assert!(!connection_info(&rx.try_recv().unwrap()).success);
        // Not closed by the handshake
        assert_eq!(session.state(), SessionState::AwaitingVersion);
    }

    #[test]
    fn test_version_in_wrong_state() {
        let (session, _rx) = session_with_rx();
        session.set_state(SessionState::InWorld);

        let err = VersionNegotiator::new(741, 12)
            .negotiate(&session, &VersionPacket { version: 741 }, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            WorldsyncError::Protocol(ProtocolError::UnexpectedPacket { .. })
        ));
    }
}
