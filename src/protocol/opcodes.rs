//! Packet opcodes
//!
//! Client-bound and server-bound opcodes live in separate enumerations.
//! The same numeric value means different packets depending on direction
//! (`0x00` is `Version` from the client and `ConnectionInfo` from the server).

/// Opcodes of packets sent by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientOpcode {
    /// Client protocol version announcement
    Version = 0x00,
    /// Request for the current map's tile data
    RequestMapData = 0x05,
    /// Private message to another player
    Whisper = 0x19,
    /// Click on an entity or tile
    Click = 0x43,
    /// Server table resend or server selection
    ServerTableRequest = 0x57,
}

impl ClientOpcode {
    /// Convert a u8 to a ClientOpcode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Version),
            0x05 => Some(Self::RequestMapData),
            0x19 => Some(Self::Whisper),
            0x43 => Some(Self::Click),
            0x57 => Some(Self::ServerTableRequest),
            _ => None,
        }
    }

    /// Get the opcode value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get the name of this opcode
    pub fn name(&self) -> &'static str {
        match self {
            Self::Version => "Version",
            Self::RequestMapData => "RequestMapData",
            Self::Whisper => "Whisper",
            Self::Click => "Click",
            Self::ServerTableRequest => "ServerTableRequest",
        }
    }
}

impl From<ClientOpcode> for u8 {
    fn from(opcode: ClientOpcode) -> Self {
        opcode.as_u8()
    }
}

impl std::fmt::Display for ClientOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), self.as_u8())
    }
}

/// Opcodes of packets sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServerOpcode {
    ConnectionInfo = 0x00,
    Redirect = 0x03,
    DisplayEntity = 0x07,
    RemoveEntity = 0x0E,
    AddItemToPane = 0x0F,
    RemoveItemFromPane = 0x10,
    AddSpellToPane = 0x17,
    RemoveSpellFromPane = 0x18,
    AddSkillToPane = 0x2C,
    RemoveSkillFromPane = 0x2D,
    Equipment = 0x37,
    Unequip = 0x38,
    ObservedEquipment = 0x3A,
    ServerTable = 0x56,
    AcceptConnection = 0x7E,
}

impl ServerOpcode {
    /// Convert a u8 to a ServerOpcode
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::ConnectionInfo),
            0x03 => Some(Self::Redirect),
            0x07 => Some(Self::DisplayEntity),
            0x0E => Some(Self::RemoveEntity),
            0x0F => Some(Self::AddItemToPane),
            0x10 => Some(Self::RemoveItemFromPane),
            0x17 => Some(Self::AddSpellToPane),
            0x18 => Some(Self::RemoveSpellFromPane),
            0x2C => Some(Self::AddSkillToPane),
            0x2D => Some(Self::RemoveSkillFromPane),
            0x37 => Some(Self::Equipment),
            0x38 => Some(Self::Unequip),
            0x3A => Some(Self::ObservedEquipment),
            0x56 => Some(Self::ServerTable),
            0x7E => Some(Self::AcceptConnection),
            _ => None,
        }
    }

    /// Get the opcode value
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<ServerOpcode> for u8 {
    fn from(opcode: ServerOpcode) -> Self {
        opcode.as_u8()
    }
}

impl std::fmt::Display for ServerOpcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.as_u8())
    }
}
