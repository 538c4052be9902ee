//! Client-to-server packets

use crate::error::ProtocolError;
use crate::net::buffer::PacketBuffer;
use crate::protocol::opcodes::ClientOpcode;
use crate::protocol::packet::Packet;

/// Protocol version announced by the client right after the banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPacket {
    pub version: u16,
}

impl Packet for VersionPacket {
    type Opcode = ClientOpcode;
    const OPCODE: ClientOpcode = ClientOpcode::Version;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u16(self.version);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: reader.read_u16()?,
        })
    }
}

/// Server table request.
///
/// `Mismatch` asks for the full table (the client's cached copy is stale);
/// `Select` picks an entry from a table the client already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTableRequestPacket {
    Mismatch,
    Select { id: u8 },
}

impl ServerTableRequestPacket {
    /// Whether the client asked for a full table resend
    pub fn mismatch(&self) -> bool {
        matches!(self, Self::Mismatch)
    }
}

impl Packet for ServerTableRequestPacket {
    type Opcode = ClientOpcode;
    const OPCODE: ClientOpcode = ClientOpcode::ServerTableRequest;

    fn serialize(&self, writer: &mut PacketBuffer) {
        match self {
            Self::Mismatch => writer.write_bool(true),
            Self::Select { id } => {
                writer.write_bool(false);
                writer.write_u8(*id);
            }
        }
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        if reader.read_bool()? {
            Ok(Self::Mismatch)
        } else {
            Ok(Self::Select {
                id: reader.read_u8()?,
            })
        }
    }
}

/// What a click landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    Entity(u32),
    Tile { x: u16, y: u16 },
}

impl ClickTarget {
    const ENTITY: u8 = 1;
    const TILE: u8 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickPacket {
    pub target: ClickTarget,
}

impl Packet for ClickPacket {
    type Opcode = ClientOpcode;
    const OPCODE: ClientOpcode = ClientOpcode::Click;

    fn serialize(&self, writer: &mut PacketBuffer) {
        match self.target {
            ClickTarget::Entity(id) => {
                writer.write_u8(ClickTarget::ENTITY);
                writer.write_u32(id);
            }
            ClickTarget::Tile { x, y } => {
                writer.write_u8(ClickTarget::TILE);
                writer.write_u16(x);
                writer.write_u16(y);
            }
        }
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let target = match reader.read_u8()? {
            ClickTarget::ENTITY => ClickTarget::Entity(reader.read_u32()?),
            ClickTarget::TILE => ClickTarget::Tile {
                x: reader.read_u16()?,
                y: reader.read_u16()?,
            },
            other => {
                return Err(ProtocolError::MalformedPacket(format!(
                    "unknown click kind {}",
                    other
                )))
            }
        };
        Ok(Self { target })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhisperPacket {
    pub target: String,
    pub message: String,
}

impl Packet for WhisperPacket {
    type Opcode = ClientOpcode;
    const OPCODE: ClientOpcode = ClientOpcode::Whisper;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_string8(&self.target);
        writer.write_string8(&self.message);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            target: reader.read_string8()?,
            message: reader.read_string8()?,
        })
    }
}

/// Map data request; carries no payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestMapDataPacket;

impl Packet for RequestMapDataPacket {
    type Opcode = ClientOpcode;
    const OPCODE: ClientOpcode = ClientOpcode::RequestMapData;

    fn serialize(&self, _writer: &mut PacketBuffer) {}

    fn deserialize(_reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip<P: Packet + PartialEq + std::fmt::Debug>(packet: P) {
        let payload = packet.to_payload();
        assert_eq!(P::decode(payload.as_bytes()).unwrap(), packet);
    }

    #[test]
    fn test_client_packets_round_trip() {
        round_trip(VersionPacket { version: 741 });
        round_trip(ServerTableRequestPacket::Mismatch);
        round_trip(ServerTableRequestPacket::Select { id: 0 });
        round_trip(ClickPacket {
            target: ClickTarget::Entity(0x0102_0304),
        });
        round_trip(ClickPacket {
            target: ClickTarget::Tile { x: 12, y: 40 },
        });
        round_trip(WhisperPacket {
            target: "Aisling2".to_string(),
            message: "hello there".to_string(),
        });
        round_trip(RequestMapDataPacket);
    }

    #[test]
    fn test_server_table_request_layout() {
        assert_eq!(ServerTableRequestPacket::Mismatch.to_payload().as_bytes(), &[1]);
        assert_eq!(
            ServerTableRequestPacket::Select { id: 7 }.to_payload().as_bytes(),
            &[0, 7]
        );
        assert!(ServerTableRequestPacket::Mismatch.mismatch());
    }

    #[test]
    fn test_request_map_data_is_empty() {
        assert!(RequestMapDataPacket.to_payload().is_empty());
        assert_eq!(RequestMapDataPacket::decode(&[]).unwrap(), RequestMapDataPacket);
    }

    #[test]
    fn test_truncated_version_is_protocol_error() {
        assert!(matches!(
            VersionPacket::decode(&[0x02]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_select_without_id_is_truncated() {
        assert!(matches!(
            ServerTableRequestPacket::decode(&[0]),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert_eq!(
            RequestMapDataPacket::decode(&[0xAA]),
            Err(ProtocolError::TrailingBytes {
                opcode: 0x05,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_unknown_click_kind() {
        assert!(matches!(
            ClickPacket::decode(&[9]),
            Err(ProtocolError::MalformedPacket(_))
        ));
    }
}
