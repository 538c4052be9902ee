//! Gateway listener
//!
//! Per connection: `AwaitingVersion -> AwaitingServerSelection ->
//! {Redirected | Disconnected}`.
//!
//! The gateway never hands session state to the world server it redirects
//! to. The client opens a fresh connection and repeats the handshake there.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{GatewayError, Result};
use crate::gateway::server_table::{ServerTable, ServerTableEntry};
use crate::net::listener::Listener;
use crate::net::session::{Session, SessionState};
use crate::protocol::client::{ServerTableRequestPacket, VersionPacket};
use crate::protocol::dispatch::PacketDispatcher;
use crate::protocol::handshake::{require_state, VersionNegotiator};
use crate::protocol::packet::Packet;
use crate::protocol::server::{RedirectPacket, ServerTablePacket};

pub struct GatewayListener {
    negotiator: VersionNegotiator,
    server_table: ServerTable,
    table_packet: ServerTablePacket,
    dispatcher: PacketDispatcher<GatewayListener>,
}

impl GatewayListener {
    pub const NAME: &'static str = "gateway";

    /// Build the listener and its handler table
    pub fn new(server_table: ServerTable, negotiator: VersionNegotiator) -> Result<Self> {
        let mut dispatcher = PacketDispatcher::new(Self::NAME);
        dispatcher.register::<VersionPacket, _>(Self::on_version)?;
        dispatcher.register::<ServerTableRequestPacket, _>(Self::on_server_table_request)?;

        let table_packet = ServerTablePacket::new(&server_table)?;

        info!(
            entries = server_table.len(),
            checksum = server_table.checksum(),
            "Gateway server table loaded"
        );

        Ok(Self {
            negotiator,
            server_table,
            table_packet,
            dispatcher,
        })
    }

    /// Build the listener from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let mut table = ServerTable::new();
        for entry in &config.server_table {
            let address: Ipv4Addr = entry
                .address
                .parse()
                .map_err(|_| GatewayError::InvalidAddress(entry.address.clone()))?;
            table.add_entry(address, entry.port, &entry.name, &entry.description)?;
        }
        Self::new(
            table,
            VersionNegotiator::new(config.client_version, config.content_version),
        )
    }

    /// The table offered to clients
    pub fn server_table(&self) -> &ServerTable {
        &self.server_table
    }

    fn on_version(&self, session: &Arc<Session>, packet: VersionPacket) -> Result<()> {
        let accepted =
            self.negotiator
                .negotiate(session, &packet, self.server_table.checksum())?;
        if accepted {
            session.set_state(SessionState::AwaitingServerSelection);
        }
        Ok(())
    }

    fn on_server_table_request(
        &self,
        session: &Arc<Session>,
        packet: ServerTableRequestPacket,
    ) -> Result<()> {
        require_state(
            session,
            SessionState::AwaitingServerSelection,
            ServerTableRequestPacket::opcode(),
        )?;

        match packet {
            ServerTableRequestPacket::Mismatch => {
                debug!(
                    session_id = session.id,
                    entries = self.server_table.len(),
                    "Sending server table"
                );
                session.send_packet(&self.table_packet);
                Ok(())
            }
            ServerTableRequestPacket::Select { id } => {
                let entry = self.server_table.get(id).ok_or_else(|| {
                    warn!(session_id = session.id, id = id, "Unknown server table id");
                    GatewayError::UnknownServerTableId(id)
                })?;
                self.redirect(session, entry);
                Ok(())
            }
        }
    }

    /// Point the client at `entry` and end the gateway session
    pub fn redirect(&self, session: &Session, entry: &ServerTableEntry) {
        session.send_packet(&RedirectPacket {
            address: entry.address,
            port: entry.port,
        });
        session.set_state(SessionState::Redirected);
        info!(
            session_id = session.id,
            server = %entry.name,
            address = %entry.address,
            port = entry.port,
            "Client redirected"
        );
    }
}

impl Listener for GatewayListener {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn dispatcher(&self) -> &PacketDispatcher<Self> {
        &self.dispatcher
    }

    fn on_connect(&self, session: &Arc<Session>) -> Result<()> {
        self.negotiator.greet(session);
        Ok(())
    }

    fn on_disconnect(&self, session: &Arc<Session>) {
        debug!(
            session_id = session.id,
            state = %session.state(),
            "Gateway session ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProtocolError, WorldsyncError};
    use crate::net::frame::Frame;
    use crate::protocol::dispatch::Dispatched;
    use tokio::sync::mpsc;

    fn listener() -> GatewayListener {
        GatewayListener::from_config(&ServerConfig::default()).unwrap()
    }

    fn session_with_rx() -> (Arc<Session>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(8);
        let session = Session::with_channel(1, "127.0.0.1:5000".parse().unwrap(), false, tx);
        (Arc::new(session), rx)
    }

    fn frame(bytes: Vec<u8>) -> Frame {
        Frame::parse_body(&bytes[3..], false).unwrap()
    }

    #[test]
    fn test_default_table() {
        let gateway = listener();
        let entry = gateway.server_table().get(0).unwrap();
        assert_eq!(entry.address, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(entry.port, 2611);
        assert_eq!(entry.name, "A new name");
        assert_eq!(entry.description, "Goes Here");
        assert_eq!(gateway.server_table().len(), 1);
    }

    #[test]
    fn test_handlers_registered() {
        let gateway = listener();
        assert_eq!(gateway.dispatcher().len(), 2);
        assert_eq!(gateway.name(), "gateway");
    }

    #[test]
    fn test_table_request_before_version_is_rejected() {
        let gateway = listener();
        let (session, _rx) = session_with_rx();

        let err = gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x57, &[1])
            .unwrap_err();
        assert!(matches!(
            err,
            WorldsyncError::Protocol(ProtocolError::UnexpectedPacket { .. })
        ));
    }

    #[test]
    fn test_version_then_select() {
        let gateway = listener();
        let (session, mut rx) = session_with_rx();

        let outcome = gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x00, &741u16.to_be_bytes())
            .unwrap();
        assert_eq!(outcome, Dispatched::Handled);
        assert_eq!(session.state(), SessionState::AwaitingServerSelection);
        assert_eq!(frame(rx.try_recv().unwrap()).opcode, 0x00);

        gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x57, &[0, 0])
            .unwrap();
        assert_eq!(session.state(), SessionState::Redirected);

        let redirect = frame(rx.try_recv().unwrap());
        assert_eq!(redirect.opcode, 0x03);
        assert_eq!(
            RedirectPacket::decode(&redirect.payload).unwrap(),
            RedirectPacket {
                address: Ipv4Addr::new(127, 0, 0, 1),
                port: 2611
            }
        );
    }

    #[test]
    fn test_unknown_server_id_is_an_error() {
        let gateway = listener();
        let (session, mut rx) = session_with_rx();

        gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x00, &741u16.to_be_bytes())
            .unwrap();
        rx.try_recv().unwrap();

        let err = gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x57, &[0, 1])
            .unwrap_err();
        assert!(matches!(
            err,
            WorldsyncError::Gateway(GatewayError::UnknownServerTableId(1))
        ));

        // Nothing queued, no redirect
        assert!(rx.try_recv().is_err());
        assert_eq!(session.state(), SessionState::AwaitingServerSelection);
    }

    #[test]
    fn test_mismatched_version_keeps_waiting() {
        let gateway = listener();
        let (session, _rx) = session_with_rx();

        gateway
            .dispatcher()
            .dispatch(&gateway, &session, 0x00, &1u16.to_be_bytes())
            .unwrap();
        assert_eq!(session.state(), SessionState::AwaitingVersion);
    }

    #[test]
    fn test_invalid_configured_address() {
        let mut config = ServerConfig::default();
        config.server_table[0].address = "not-an-ip".to_string();
        assert!(matches!(
            GatewayListener::from_config(&config),
            Err(WorldsyncError::Gateway(GatewayError::InvalidAddress(_)))
        ));
    }
}
