//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name shown in logs
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Gateway (login) port
    #[serde(default = "default_gateway_port")]
    pub gateway_port: u16,

    /// World server port (TCP)
    #[serde(default = "default_world_port")]
    pub world_port: u16,

    /// World server port for browser clients
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,

    /// Whether to accept WebSocket clients on `websocket_port`
    #[serde(default)]
    pub websocket_enabled: bool,

    /// Client protocol version both listeners accept
    #[serde(default = "default_client_version")]
    pub client_version: u16,

    /// Content version reported in connection info
    #[serde(default = "default_content_version")]
    pub content_version: u32,

    /// Maximum number of players in the world
    #[serde(default = "default_max_players")]
    pub max_players: u32,

    /// Maximum concurrent connections from one IP
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    /// Seconds a connection may spend before finishing the handshake
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// World tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Interest area radius in tiles
    #[serde(default = "default_interest_radius")]
    pub interest_radius: f32,

    /// Send equipment changes to a player's observers by default
    #[serde(default)]
    pub broadcast_equipment: bool,

    /// Where new players appear
    #[serde(default)]
    pub spawn: SpawnConfig,

    /// World servers offered by the gateway, in display order
    #[serde(default = "default_server_table")]
    pub server_table: Vec<ServerTableEntryConfig>,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// Spawn location for new players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    #[serde(default)]
    pub map: u16,

    #[serde(default = "default_spawn_coordinate")]
    pub x: u16,

    #[serde(default = "default_spawn_coordinate")]
    pub y: u16,
}

/// One gateway server table entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTableEntryConfig {
    /// IPv4 address clients are redirected to
    pub address: String,

    pub port: u16,

    pub name: String,

    #[serde(default)]
    pub description: String,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

// Default value functions
fn default_server_name() -> String {
    "Worldsync".to_string()
}

fn default_gateway_port() -> u16 {
    2610
}

fn default_world_port() -> u16 {
    2611
}

fn default_websocket_port() -> u16 {
    2612
}

fn default_client_version() -> u16 {
    741
}

fn default_content_version() -> u32 {
    12
}

fn default_max_players() -> u32 {
    500
}

fn default_max_connections_per_ip() -> usize {
    10
}

fn default_handshake_timeout() -> u64 {
    30
}

fn default_tick_rate() -> u64 {
    100
}

fn default_interest_radius() -> f32 {
    5.0
}

fn default_spawn_coordinate() -> u16 {
    10
}

fn default_server_table() -> Vec<ServerTableEntryConfig> {
    vec![ServerTableEntryConfig {
        address: "127.0.0.1".to_string(),
        port: 2611,
        name: "A new name".to_string(),
        description: "Goes Here".to_string(),
    }]
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            map: 0,
            x: default_spawn_coordinate(),
            y: default_spawn_coordinate(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            gateway_port: default_gateway_port(),
            world_port: default_world_port(),
            websocket_port: default_websocket_port(),
            websocket_enabled: false,
            client_version: default_client_version(),
            content_version: default_content_version(),
            max_players: default_max_players(),
            max_connections_per_ip: default_max_connections_per_ip(),
            handshake_timeout_secs: default_handshake_timeout(),
            tick_rate_ms: default_tick_rate(),
            interest_radius: default_interest_radius(),
            broadcast_equipment: false,
            spawn: SpawnConfig::default(),
            server_table: default_server_table(),
            log_format: LogFormat::default(),
            debug: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("WORLDSYNC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Parse a TOML document, filling unspecified fields with defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("WORLDSYNC_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("WORLDSYNC_GATEWAY_PORT") {
            if let Ok(port) = val.parse() {
                self.gateway_port = port;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_WORLD_PORT") {
            if let Ok(port) = val.parse() {
                self.world_port = port;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_WEBSOCKET_PORT") {
            if let Ok(port) = val.parse() {
                self.websocket_port = port;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_WEBSOCKET_ENABLED") {
            self.websocket_enabled = parse_flag(&val);
        }
        if let Ok(val) = env::var("WORLDSYNC_CLIENT_VERSION") {
            if let Ok(version) = val.parse() {
                self.client_version = version;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_MAX_PLAYERS") {
            if let Ok(max) = val.parse() {
                self.max_players = max;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_INTEREST_RADIUS") {
            if let Ok(radius) = val.parse() {
                self.interest_radius = radius;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_BROADCAST_EQUIPMENT") {
            self.broadcast_equipment = parse_flag(&val);
        }
        if let Ok(val) = env::var("WORLDSYNC_LOG_FORMAT") {
            if val.eq_ignore_ascii_case("json") {
                self.log_format = LogFormat::Json;
            } else if val.eq_ignore_ascii_case("pretty") {
                self.log_format = LogFormat::Pretty;
            }
        }
        if let Ok(val) = env::var("WORLDSYNC_DEBUG") {
            self.debug = parse_flag(&val);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Ports must be unique
        if self.gateway_port == self.world_port {
            anyhow::bail!("Gateway port and world port must be different");
        }
        if self.websocket_enabled
            && (self.websocket_port == self.gateway_port || self.websocket_port == self.world_port)
        {
            anyhow::bail!("WebSocket port must be different from gateway and world ports");
        }

        if self.max_players == 0 || self.max_players > 10000 {
            anyhow::bail!("Max players must be between 1 and 10000");
        }

        if self.tick_rate_ms < 20 || self.tick_rate_ms > 5000 {
            anyhow::bail!("Tick rate must be between 20ms and 5000ms");
        }

        if !(self.interest_radius > 0.0 && self.interest_radius.is_finite()) {
            anyhow::bail!("Interest radius must be a positive number");
        }

        if self.handshake_timeout_secs == 0 {
            anyhow::bail!("Handshake timeout must be at least one second");
        }

        if self.server_table.is_empty() {
            anyhow::bail!("Server table must contain at least one entry");
        }
        if self.server_table.len() > 256 {
            anyhow::bail!("Server table cannot hold more than 256 entries");
        }

        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}
