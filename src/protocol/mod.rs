//! Protocol module
//!
//! This module contains the packet protocol shared by all listeners:
//! - Opcode enumerations for each direction
//! - The packet serialize/deserialize contract
//! - Client and server packet definitions
//! - Startup-built handler dispatch tables
//! - Version negotiation

pub mod client;
pub mod dispatch;
pub mod handshake;
pub mod opcodes;
pub mod packet;
pub mod server;

pub use dispatch::{Dispatched, PacketDispatcher};
pub use opcodes::{ClientOpcode, ServerOpcode};
pub use packet::{ClientPacket, Packet, ServerPacket};
