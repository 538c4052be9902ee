//! Application state module
//!
//! Contains the shared state used across all server connections.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::listener::WorldListener;
use crate::game::world::{World, WorldSettings};
use crate::gateway::GatewayListener;
use crate::net::handler::ConnectionHandler;
use crate::net::session::SessionManager;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Session manager for tracking connected clients
    pub session_manager: Arc<SessionManager>,
    /// Game world state
    pub world: Arc<Mutex<World>>,
    /// Login-facing listener
    pub gateway: Arc<GatewayListener>,
    /// World server listener
    pub world_listener: Arc<WorldListener>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Build every listener and the world from configuration.
    ///
    /// Fails if a listener's handler table is misconfigured.
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<Self> {
        let world = Arc::new(Mutex::new(World::new(WorldSettings::from_config(&config))));

        let gateway = Arc::new(GatewayListener::from_config(&config)?);
        let world_listener = Arc::new(WorldListener::from_config(
            &config,
            world.clone(),
            gateway.server_table().checksum(),
        )?);

        info!(
            server = %config.server_name,
            servers = gateway.server_table().len(),
            "Application state initialized"
        );

        Ok(Self {
            session_manager: Arc::new(SessionManager::with_limits(config.max_connections_per_ip)),
            config,
            world,
            gateway,
            world_listener,
            shutdown_tx,
        })
    }

    fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.config.handshake_timeout_secs)
    }

    /// Connection handler for the gateway port
    pub fn gateway_handler(&self) -> ConnectionHandler<GatewayListener> {
        ConnectionHandler::new(
            self.gateway.clone(),
            self.session_manager.clone(),
            self.handshake_timeout(),
        )
    }

    /// Connection handler for the world ports
    pub fn world_handler(&self) -> ConnectionHandler<WorldListener> {
        ConnectionHandler::new(
            self.world_listener.clone(),
            self.session_manager.clone(),
            self.handshake_timeout(),
        )
    }

    /// World tick interval
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.config.tick_rate_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::listener::Listener;

    #[test]
    fn test_state_from_default_config() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(ServerConfig::default(), shutdown_tx).unwrap();

        assert_eq!(state.gateway.server_table().len(), 1);
        assert_eq!(state.world.lock().player_count(), 0);
        assert_eq!(state.session_manager.count(), 0);
        assert_eq!(state.gateway_handler().listener().name(), "gateway");
        assert_eq!(state.world_handler().listener().name(), "world");
        assert_eq!(state.tick_rate(), Duration::from_millis(100));
    }
}
