//! Error handling module
//!
//! Defines custom error types for the Worldsync server.

use std::io;

use thiserror::Error;

/// Main error type for the Worldsync server
#[derive(Error, Debug)]
pub enum WorldsyncError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Gateway request errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Handler registration errors
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Game logic errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorldsyncError {
    /// Whether the error ends the connection that produced it.
    ///
    /// Only a closed connection is "expected"; everything else is logged
    /// at warn before the connection is torn down.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, WorldsyncError::Network(NetworkError::ConnectionClosed))
    }
}

/// Network-specific errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timeout")]
    Timeout,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Too many connections from {0}")]
    TooManyConnections(String),

    #[error("Session not found: {0}")]
    SessionNotFound(u64),

    #[error("Write buffer full")]
    WriteBufferFull,

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

/// Protocol-specific errors
///
/// Any of these terminates the connection that produced the bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Truncated packet: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Trailing bytes after packet 0x{opcode:02X}: {remaining}")]
    TrailingBytes { opcode: u8, remaining: usize },

    #[error("Invalid frame marker: 0x{0:02X}")]
    InvalidFrameMarker(u8),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Packet too large: {size} bytes (max: {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Invalid string encoding")]
    InvalidStringEncoding,

    #[error("String too long: {0} bytes")]
    StringTooLong(usize),

    #[error("Unexpected packet in state {state}: opcode 0x{opcode:02X}")]
    UnexpectedPacket { state: String, opcode: u8 },

    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Invalid cipher seed: {0}")]
    InvalidCipherSeed(u8),

    #[error("Invalid cipher key length: {0}")]
    InvalidCipherKey(usize),
}

/// Gateway request errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unknown server table id: {0}")]
    UnknownServerTableId(u8),

    #[error("Server table full")]
    ServerTableFull,

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
}

/// Handler table construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Duplicate handler for opcode 0x{opcode:02X} on {listener} listener")]
    DuplicateHandler { listener: &'static str, opcode: u8 },
}

/// Slot container errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Invalid slot: {0}")]
    InvalidSlot(usize),

    #[error("Slot {0} is occupied")]
    SlotOccupied(usize),

    #[error("Slot {0} is empty")]
    SlotEmpty(usize),

    #[error("Collection full")]
    Full,
}

/// Game logic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Entity not found: {0}")]
    EntityNotFound(u32),

    #[error("Entity {0} is not a player")]
    NotAPlayer(u32),

    #[error("World full")]
    WorldFull,

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// Result type alias for Worldsync operations
pub type Result<T> = std::result::Result<T, WorldsyncError>;
