//! Worldsync Server Library
//!
//! This library provides the core functionality for the Worldsync world
//! server: the login gateway, the binary packet protocol, and the interest
//! and synchronization core that decides which sessions hear about which
//! entities.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `crypto` - Per-session packet obfuscation
//! - `error` - Error types and result definitions
//! - `game` - Entity arena, interest areas, observer sets and panes
//! - `gateway` - Server table and the login-facing listener
//! - `net` - Framing, transports, sessions and connection handling
//! - `protocol` - Opcodes, packets, dispatch and the version handshake

pub mod config;
pub mod crypto;
pub mod error;
pub mod game;
pub mod gateway;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{Result, WorldsyncError};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
