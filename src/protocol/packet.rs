//! Packet contract
//!
//! Every packet type declares a fixed opcode and a symmetric pair of
//! operations: `serialize` writes exactly the bytes `deserialize` consumes.
//! The opcode type ties a packet to one direction, so a client packet can
//! never be queued on a peer and a server packet can never be registered
//! with a dispatcher.

use crate::error::ProtocolError;
use crate::net::buffer::PacketBuffer;
use crate::protocol::opcodes::{ClientOpcode, ServerOpcode};

/// A packet with a fixed opcode and wire layout
pub trait Packet: Sized {
    /// Opcode enumeration for the packet's direction
    type Opcode: Copy + Into<u8>;

    /// The packet opcode
    const OPCODE: Self::Opcode;

    /// Write the payload (without opcode or framing)
    fn serialize(&self, writer: &mut PacketBuffer);

    /// Read the payload written by [`Packet::serialize`]
    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError>;

    /// Get the raw opcode value
    fn opcode() -> u8 {
        Self::OPCODE.into()
    }

    /// Serialize into a fresh payload buffer
    fn to_payload(&self) -> PacketBuffer {
        let mut buffer = PacketBuffer::with_capacity(64);
        self.serialize(&mut buffer);
        buffer
    }

    /// Decode a complete payload.
    ///
    /// Fails if the payload is short or if bytes are left over, since a
    /// frame carries exactly one packet.
    fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketBuffer::from_bytes(payload);
        let packet = Self::deserialize(&mut reader)?;
        if reader.has_remaining() {
            return Err(ProtocolError::TrailingBytes {
                opcode: Self::opcode(),
                remaining: reader.remaining(),
            });
        }
        Ok(packet)
    }
}

/// Marker for packets the client sends
pub trait ClientPacket: Packet<Opcode = ClientOpcode> {}

impl<P: Packet<Opcode = ClientOpcode>> ClientPacket for P {}

/// Marker for packets the server sends
pub trait ServerPacket: Packet<Opcode = ServerOpcode> {}

impl<P: Packet<Opcode = ServerOpcode>> ServerPacket for P {}
