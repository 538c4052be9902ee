//! Server-to-client packets

use std::io::{self, Read, Write};
use std::net::Ipv4Addr;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::ProtocolError;
use crate::gateway::server_table::ServerTable;
use crate::net::buffer::PacketBuffer;
use crate::protocol::opcodes::ServerOpcode;
use crate::protocol::packet::Packet;

/// Marker byte that precedes the connection banner
const BANNER_PREFIX: u8 = 0x1B;

/// Text banner sent as soon as a connection is accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptConnectionPacket {
    pub message: String,
}

impl AcceptConnectionPacket {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Packet for AcceptConnectionPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::AcceptConnection;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u8(BANNER_PREFIX);
        writer.write_bytes(self.message.as_bytes());
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let prefix = reader.read_u8()?;
        if prefix != BANNER_PREFIX {
            return Err(ProtocolError::MalformedPacket(format!(
                "banner prefix 0x{:02X}",
                prefix
            )));
        }
        let message = String::from_utf8(reader.read_remaining())
            .map_err(|_| ProtocolError::InvalidStringEncoding)?;
        Ok(Self { message })
    }
}

/// Reply to the version packet, carrying the session's cipher material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfoPacket {
    pub success: bool,
    pub version: u32,
    pub table_checksum: u32,
    pub seed: u8,
    pub key: String,
}

impl Packet for ConnectionInfoPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::ConnectionInfo;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_bool(self.success);
        writer.write_u32(self.version);
        writer.write_u32(self.table_checksum);
        writer.write_u8(self.seed);
        writer.write_string8(&self.key);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            success: reader.read_bool()?,
            version: reader.read_u32()?,
            table_checksum: reader.read_u32()?,
            seed: reader.read_u8()?,
            key: reader.read_string8()?,
        })
    }
}

/// Points the client at another server; it reconnects and starts over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPacket {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl Packet for RedirectPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::Redirect;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_bytes(&self.address.octets());
        writer.write_u16(self.port);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            address: Ipv4Addr::from(reader.read_array::<4>()?),
            port: reader.read_u16()?,
        })
    }
}

/// The full server table, zlib-compressed behind a u16 length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTablePacket {
    pub table: ServerTable,
    compressed: Vec<u8>,
}

impl ServerTablePacket {
    pub fn new(table: &ServerTable) -> io::Result<Self> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&table.encode())?;
        let compressed = encoder.finish()?;
        if compressed.len() > u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "compressed server table exceeds u16 length",
            ));
        }
        Ok(Self {
            table: table.clone(),
            compressed,
        })
    }
}

impl Packet for ServerTablePacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::ServerTable;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u16(self.compressed.len() as u16);
        writer.write_bytes(&self.compressed);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let length = reader.read_u16()? as usize;
        let compressed = reader.read_bytes(length)?;

        let mut raw = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|e| ProtocolError::Decompression(e.to_string()))?;

        let table = ServerTable::decode(&mut PacketBuffer::from_bytes(&raw))?;
        Ok(Self { table, compressed })
    }
}

/// Makes an entity visible to the receiving client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayEntityPacket {
    pub entity_id: u32,
    pub kind: u8,
    pub x: u16,
    pub y: u16,
    pub name: String,
}

impl Packet for DisplayEntityPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::DisplayEntity;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u32(self.entity_id);
        writer.write_u8(self.kind);
        writer.write_u16(self.x);
        writer.write_u16(self.y);
        writer.write_string8(&self.name);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            entity_id: reader.read_u32()?,
            kind: reader.read_u8()?,
            x: reader.read_u16()?,
            y: reader.read_u16()?,
            name: reader.read_string8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveEntityPacket {
    pub entity_id: u32,
}

impl Packet for RemoveEntityPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::RemoveEntity;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u32(self.entity_id);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            entity_id: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddItemToPanePacket {
    pub slot: u8,
    pub sprite: u16,
    pub color: u8,
    pub name: String,
    pub quantity: u32,
    pub stackable: bool,
    pub max_durability: u32,
    pub durability: u32,
}

impl Packet for AddItemToPanePacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::AddItemToPane;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u8(self.slot);
        writer.write_u16(self.sprite);
        writer.write_u8(self.color);
        writer.write_string8(&self.name);
        writer.write_u32(self.quantity);
        writer.write_bool(self.stackable);
        writer.write_u32(self.max_durability);
        writer.write_u32(self.durability);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: reader.read_u8()?,
            sprite: reader.read_u16()?,
            color: reader.read_u8()?,
            name: reader.read_string8()?,
            quantity: reader.read_u32()?,
            stackable: reader.read_bool()?,
            max_durability: reader.read_u32()?,
            durability: reader.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSpellToPanePacket {
    pub slot: u8,
    pub icon: u16,
    pub spell_type: u8,
    pub name: String,
    pub prompt: String,
    pub cast_lines: u8,
}

impl Packet for AddSpellToPanePacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::AddSpellToPane;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u8(self.slot);
        writer.write_u16(self.icon);
        writer.write_u8(self.spell_type);
        writer.write_string8(&self.name);
        writer.write_string8(&self.prompt);
        writer.write_u8(self.cast_lines);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: reader.read_u8()?,
            icon: reader.read_u16()?,
            spell_type: reader.read_u8()?,
            name: reader.read_string8()?,
            prompt: reader.read_string8()?,
            cast_lines: reader.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSkillToPanePacket {
    pub slot: u8,
    pub icon: u16,
    pub name: String,
}

impl Packet for AddSkillToPanePacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::AddSkillToPane;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u8(self.slot);
        writer.write_u16(self.icon);
        writer.write_string8(&self.name);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: reader.read_u8()?,
            icon: reader.read_u16()?,
            name: reader.read_string8()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentPacket {
    pub slot: u8,
    pub sprite: u16,
    pub color: u8,
    pub name: String,
    pub max_durability: u32,
    pub durability: u32,
}

impl Packet for EquipmentPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::Equipment;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u8(self.slot);
        writer.write_u16(self.sprite);
        writer.write_u8(self.color);
        writer.write_string8(&self.name);
        writer.write_u32(self.max_durability);
        writer.write_u32(self.durability);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            slot: reader.read_u8()?,
            sprite: reader.read_u16()?,
            color: reader.read_u8()?,
            name: reader.read_string8()?,
            max_durability: reader.read_u32()?,
            durability: reader.read_u32()?,
        })
    }
}

/// Equipment change on another entity, sent to its observers.
/// A sprite of 0 means the slot was emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedEquipmentPacket {
    pub entity_id: u32,
    pub slot: u8,
    pub sprite: u16,
    pub color: u8,
}

impl Packet for ObservedEquipmentPacket {
    type Opcode = ServerOpcode;
    const OPCODE: ServerOpcode = ServerOpcode::ObservedEquipment;

    fn serialize(&self, writer: &mut PacketBuffer) {
        writer.write_u32(self.entity_id);
        writer.write_u8(self.slot);
        writer.write_u16(self.sprite);
        writer.write_u8(self.color);
    }

    fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        Ok(Self {
            entity_id: reader.read_u32()?,
            slot: reader.read_u8()?,
            sprite: reader.read_u16()?,
            color: reader.read_u8()?,
        })
    }
}

/// Pane removals only carry the slot; the payload is already gone.
macro_rules! slot_packet {
    ($(#[$meta:meta])* $name:ident, $opcode:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub slot: u8,
        }

        impl Packet for $name {
            type Opcode = ServerOpcode;
            const OPCODE: ServerOpcode = $opcode;

            fn serialize(&self, writer: &mut PacketBuffer) {
                writer.write_u8(self.slot);
            }

            fn deserialize(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
                Ok(Self {
                    slot: reader.read_u8()?,
                })
            }
        }
    };
}

slot_packet!(RemoveItemFromPanePacket, ServerOpcode::RemoveItemFromPane);
slot_packet!(RemoveSpellFromPanePacket, ServerOpcode::RemoveSpellFromPane);
slot_packet!(RemoveSkillFromPanePacket, ServerOpcode::RemoveSkillFromPane);
slot_packet!(UnequipPacket, ServerOpcode::Unequip);
