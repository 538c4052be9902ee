//! World listener
//!
//! Per connection: `AwaitingVersion -> InWorld -> Disconnected`.
//!
//! The handshake mirrors the gateway's. Once the version matches, the
//! session cipher is switched on and a player is spawned for the
//! connection; the player is despawned when the connection ends.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::world::World;
use crate::net::listener::Listener;
use crate::net::session::{Session, SessionState};
use crate::protocol::client::{
    ClickPacket, ClickTarget, RequestMapDataPacket, VersionPacket, WhisperPacket,
};
use crate::protocol::dispatch::PacketDispatcher;
use crate::protocol::handshake::{require_state, VersionNegotiator};
use crate::protocol::packet::Packet;

pub struct WorldListener {
    negotiator: VersionNegotiator,
    world: Arc<Mutex<World>>,
    /// Checksum of the gateway's table, echoed in connection info
    table_checksum: u32,
    dispatcher: PacketDispatcher<WorldListener>,
}

impl WorldListener {
    pub const NAME: &'static str = "world";

    pub fn new(
        world: Arc<Mutex<World>>,
        negotiator: VersionNegotiator,
        table_checksum: u32,
    ) -> Result<Self> {
        let mut dispatcher = PacketDispatcher::new(Self::NAME);
        dispatcher.register::<VersionPacket, _>(Self::on_version)?;
        dispatcher.register::<ClickPacket, _>(Self::on_click)?;
        dispatcher.register::<WhisperPacket, _>(Self::on_whisper)?;
        dispatcher.register::<RequestMapDataPacket, _>(Self::on_request_map_data)?;

        Ok(Self {
            negotiator,
            world,
            table_checksum,
            dispatcher,
        })
    }

    pub fn from_config(
        config: &ServerConfig,
        world: Arc<Mutex<World>>,
        table_checksum: u32,
    ) -> Result<Self> {
        Self::new(
            world,
            VersionNegotiator::new(config.client_version, config.content_version),
            table_checksum,
        )
    }

    pub fn world(&self) -> &Arc<Mutex<World>> {
        &self.world
    }

    fn on_version(&self, session: &Arc<Session>, packet: VersionPacket) -> Result<()> {
        if !self
            .negotiator
            .negotiate(session, &packet, self.table_checksum)?
        {
            return Ok(());
        }

        // Connection info above went out in the clear
        session.enable_cipher()?;

        let id = {
            let mut world = self.world.lock();
            let spawn = world.settings.spawn;
            world.spawn_player(format!("player{}", session.id), spawn, session.clone())?
        };
        session.set_network_id(id);
        session.set_state(SessionState::InWorld);

        info!(
            session_id = session.id,
            network_id = %id,
            "Player entered world"
        );
        Ok(())
    }

    fn on_click(&self, session: &Arc<Session>, packet: ClickPacket) -> Result<()> {
        require_state(session, SessionState::InWorld, ClickPacket::opcode())?;

        match packet.target {
            ClickTarget::Entity(entity_id) => {
                trace!(session_id = session.id, entity_id = entity_id, "Entity clicked");
            }
            ClickTarget::Tile { x, y } => {
                trace!(session_id = session.id, x = x, y = y, "Tile clicked");
            }
        }
        Ok(())
    }

    fn on_whisper(&self, session: &Arc<Session>, packet: WhisperPacket) -> Result<()> {
        require_state(session, SessionState::InWorld, WhisperPacket::opcode())?;
        trace!(
            session_id = session.id,
            target = %packet.target,
            len = packet.message.len(),
            "Whisper received"
        );
        Ok(())
    }

    fn on_request_map_data(
        &self,
        session: &Arc<Session>,
        _packet: RequestMapDataPacket,
    ) -> Result<()> {
        require_state(session, SessionState::InWorld, RequestMapDataPacket::opcode())?;
        trace!(session_id = session.id, "Map data requested");
        Ok(())
    }
}

impl Listener for WorldListener {
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
        let Some(id) = session.take_network_id() else {
            return;
        };
        if let Err(e) = self.world.lock().despawn(id) {
            debug!(
                session_id = session.id,
                network_id = %id,
                error = %e,
                "Player already gone"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProtocolError, WorldsyncError};
    use crate::game::entity::Location;
    use crate::game::world::WorldSettings;
    use crate::protocol::dispatch::Dispatched;
    use tokio::sync::mpsc;

    fn listener() -> WorldListener {
        let world = Arc::new(Mutex::new(World::new(WorldSettings::default())));
        WorldListener::new(world, VersionNegotiator::new(741, 12), 0xDEAD).unwrap()
    }

    fn session_with_rx() -> (Arc<Session>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Session::with_channel(3, "127.0.0.1:5000".parse().unwrap(), false, tx);
        (Arc::new(session), rx)
    }

    fn enter(listener: &WorldListener, session: &Arc<Session>) {
        listener
            .dispatcher()
            .dispatch(listener, session, 0x00, &741u16.to_be_bytes())
            .unwrap();
    }

    #[test]
    fn test_handlers_registered() {
        let world = listener();
        assert_eq!(world.dispatcher().len(), 4);
        assert_eq!(world.name(), "world");
    }

    #[test]
    fn test_version_spawns_player() {
        let world = listener();
        let (session, _rx) = session_with_rx();
        world.on_connect(&session).unwrap();
        enter(&world, &session);

        assert_eq!(session.state(), SessionState::InWorld);
        assert!(session.cipher_enabled());

        let id = session.network_id().unwrap();
        let arena = world.world().lock();
        assert_eq!(arena.player_count(), 1);
        assert_eq!(
            arena.entity(id).unwrap().location(),
            Location::new(0, 10, 10)
        );
    }

    #[test]
    fn test_version_mismatch_does_not_spawn() {
        let world = listener();
        let (session, _rx) = session_with_rx();
        world
            .dispatcher()
            .dispatch(&world, &session, 0x00, &100u16.to_be_bytes())
            .unwrap();

        assert_eq!(session.state(), SessionState::AwaitingVersion);
        assert!(!session.cipher_enabled());
        assert_eq!(world.world().lock().player_count(), 0);
    }

    #[test]
    fn test_in_world_packets() {
        let world = listener();
        let (session, _rx) = session_with_rx();
        enter(&world, &session);

        let click = [1, 0, 0, 0, 9];
        let whisper = [3, b'B', b'o', b'b', 2, b'h', b'i'];
        for (opcode, payload) in [(0x43, &click[..]), (0x19, &whisper[..]), (0x05, &[][..])] {
            assert_eq!(
                world
                    .dispatcher()
                    .dispatch(&world, &session, opcode, payload)
                    .unwrap(),
                Dispatched::Handled
            );
        }
    }

    #[test]
    fn test_click_before_world_is_rejected() {
        let world = listener();
        let (session, _rx) = session_with_rx();
        let err = world
            .dispatcher()
            .dispatch(&world, &session, 0x43, &[3, 0, 1, 0, 2])
            .unwrap_err();
        assert!(matches!(
            err,
            WorldsyncError::Protocol(ProtocolError::UnexpectedPacket { opcode: 0x43, .. })
        ));
    }

    #[test]
    fn test_disconnect_despawns_player() {
        let world = listener();
        let (session, _rx) = session_with_rx();
        enter(&world, &session);
        assert_eq!(world.world().lock().player_count(), 1);

        world.on_disconnect(&session);
        assert_eq!(world.world().lock().player_count(), 0);
        assert_eq!(session.network_id(), None);

        // Second call is harmless
        world.on_disconnect(&session);
    }
}
