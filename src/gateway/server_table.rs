//! Server table
//!
//! The ordered list of world servers offered to clients. Entry ids are
//! insertion indices, so the order clients receive is the order entries
//! were added and lookup by id is a direct index.

use std::net::Ipv4Addr;

use crate::error::{GatewayError, ProtocolError};
use crate::net::buffer::PacketBuffer;

/// Maximum number of entries addressable by a u8 id
pub const MAX_ENTRIES: usize = u8::MAX as usize + 1;

/// A single world server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTableEntry {
    pub id: u8,
    pub address: Ipv4Addr,
    pub port: u16,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerTable {
    entries: Vec<ServerTableEntry>,
}

impl ServerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id
    pub fn add_entry(
        &mut self,
        address: Ipv4Addr,
        port: u16,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<u8, GatewayError> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(GatewayError::ServerTableFull);
        }
        let id = self.entries.len() as u8;
        self.entries.push(ServerTableEntry {
            id,
            address,
            port,
            name: name.into(),
            description: description.into(),
        });
        Ok(id)
    }

    /// Look up an entry by id
    pub fn get(&self, id: u8) -> Option<&ServerTableEntry> {
        self.entries.get(id as usize)
    }

    /// Entries in the order they are sent to clients
    pub fn entries(&self) -> &[ServerTableEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the uncompressed table body
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = PacketBuffer::with_capacity(1 + self.entries.len() * 32);
        // A full table of 256 entries wraps to 0 on the wire
        buffer.write_u8(self.entries.len() as u8);
        for entry in &self.entries {
            buffer.write_u8(entry.id);
            buffer.write_bytes(&entry.address.octets());
            buffer.write_u16(entry.port);
            buffer.write_string8(&entry.name);
            buffer.write_string8(&entry.description);
        }
        buffer.into_vec()
    }

    /// Decode a table body produced by [`ServerTable::encode`]
    pub fn decode(reader: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let count = match reader.read_u8()? {
            0 if reader.has_remaining() => MAX_ENTRIES,
            n => n as usize,
        };
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(ServerTableEntry {
                id: reader.read_u8()?,
                address: Ipv4Addr::from(reader.read_array::<4>()?),
                port: reader.read_u16()?,
                name: reader.read_string8()?,
                description: reader.read_string8()?,
            });
        }
        Ok(Self { entries })
    }

    /// CRC-32 of the encoded table.
    ///
    /// Clients compare this against their cached copy to decide whether
    /// to ask for a resend.
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(&self.encode())
    }
}
