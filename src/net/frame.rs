//! Wire framing
//!
//! ```text
//! 0xAA | length (u16 BE) | opcode | [ordinal] | payload
//! ```
//!
//! `length` counts every byte after the length field. The ordinal byte is
//! present only once the session cipher is active.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

/// First byte of every frame
pub const FRAME_MARKER: u8 = 0xAA;

/// Marker plus length field
pub const HEADER_SIZE: usize = 3;

/// Largest body a u16 length can describe
pub const MAX_FRAME_BODY: usize = u16::MAX as usize;

/// A single framed packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub ordinal: Option<u8>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Frame without cipher ordinal
    pub fn plain(opcode: u8, payload: Vec<u8>) -> Self {
        Self {
            opcode,
            ordinal: None,
            payload,
        }
    }

    /// Frame carrying a cipher ordinal
    pub fn encrypted(opcode: u8, ordinal: u8, payload: Vec<u8>) -> Self {
        Self {
            opcode,
            ordinal: Some(ordinal),
            payload,
        }
    }

    fn body_len(&self) -> usize {
        1 + usize::from(self.ordinal.is_some()) + self.payload.len()
    }

    /// Encode into wire bytes
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let body_len = self.body_len();
        if body_len > MAX_FRAME_BODY {
            return Err(ProtocolError::PacketTooLarge {
                size: body_len,
                max: MAX_FRAME_BODY,
            });
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + body_len);
        out.push(FRAME_MARKER);
        out.extend_from_slice(&(body_len as u16).to_be_bytes());
        out.push(self.opcode);
        if let Some(ordinal) = self.ordinal {
            out.push(ordinal);
        }
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse the 3-byte header, returning the body length
    pub fn parse_header(header: [u8; HEADER_SIZE]) -> Result<usize, ProtocolError> {
        if header[0] != FRAME_MARKER {
            return Err(ProtocolError::InvalidFrameMarker(header[0]));
        }
        let length = u16::from_be_bytes([header[1], header[2]]) as usize;
        if length == 0 {
            return Err(ProtocolError::EmptyFrame);
        }
        Ok(length)
    }

    /// Parse a frame body (everything after the length field)
    pub fn parse_body(body: &[u8], with_ordinal: bool) -> Result<Self, ProtocolError> {
        let (&opcode, rest) = body.split_first().ok_or(ProtocolError::EmptyFrame)?;
        if !with_ordinal {
            return Ok(Self::plain(opcode, rest.to_vec()));
        }
        let (&ordinal, payload) = rest.split_first().ok_or(ProtocolError::Truncated {
            needed: 1,
            remaining: 0,
        })?;
        Ok(Self::encrypted(opcode, ordinal, payload.to_vec()))
    }

    /// Pull one complete frame off the front of `buffer`, if there is one
    pub fn decode(buffer: &mut BytesMut, with_ordinal: bool) -> Result<Option<Self>, ProtocolError> {
        if buffer.len() < HEADER_SIZE {
            return Ok(None);
        }
        let length = Self::parse_header([buffer[0], buffer[1], buffer[2]])?;
        if buffer.len() < HEADER_SIZE + length {
            return Ok(None);
        }
        buffer.advance(HEADER_SIZE);
        let body = buffer.split_to(length);
        Self::parse_body(&body, with_ordinal).map(Some)
    }
}
