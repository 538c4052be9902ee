//! Packet buffer implementation
//!
//! A big-endian byte buffer used for every packet payload:
//! - Unsigned integer types (u8, u16, u32) and booleans
//! - Length-prefixed `string8` strings
//! - Raw byte runs
//!
//! Unlike a plain cursor, every read is checked. Reading past the end
//! returns [`ProtocolError::Truncated`] so a short payload can never be
//! mistaken for zeros.

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// Maximum payload size that fits in a frame length field
pub const MAX_PACKET_SIZE: usize = 65535;

/// Maximum encoded length of a `string8`
pub const MAX_STRING8_LEN: usize = u8::MAX as usize;

type ReadResult<T> = std::result::Result<T, ProtocolError>;

/// Packet buffer for reading and writing protocol payloads
#[derive(Debug, Clone, Default)]
pub struct PacketBuffer {
    /// Internal byte buffer
    data: BytesMut,
    /// Current read position
    read_pos: usize,
}

impl PacketBuffer {
    /// Create a new empty packet buffer
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            read_pos: 0,
        }
    }

    /// Create a packet buffer with a specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Create a packet buffer from existing bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: BytesMut::from(bytes),
            read_pos: 0,
        }
    }

    // ============ Properties ============

    /// Get the current read position
    #[inline]
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Get the total length of the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the number of bytes remaining to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.read_pos)
    }

    /// Check if there are bytes remaining to read
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// Get a reference to the underlying bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the written bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.data.to_vec()
    }

    fn ensure(&self, needed: usize) -> ReadResult<()> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(ProtocolError::Truncated { needed, remaining });
        }
        Ok(())
    }

    // ============ Reading ============

    /// Read an unsigned byte
    pub fn read_u8(&mut self) -> ReadResult<u8> {
        self.ensure(1)?;
        let value = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(value)
    }

    /// Read a boolean encoded as a single byte (any non-zero value is true)
    pub fn read_bool(&mut self) -> ReadResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> ReadResult<u16> {
        self.ensure(2)?;
        let pos = self.read_pos;
        let value = u16::from_be_bytes([self.data[pos], self.data[pos + 1]]);
        self.read_pos += 2;
        Ok(value)
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> ReadResult<u32> {
        self.ensure(4)?;
        let pos = self.read_pos;
        let value = u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]);
        self.read_pos += 4;
        Ok(value)
    }

    /// Read exactly `length` bytes
    pub fn read_bytes(&mut self, length: usize) -> ReadResult<Vec<u8>> {
        self.ensure(length)?;
        let bytes = self.data[self.read_pos..self.read_pos + length].to_vec();
        self.read_pos += length;
        Ok(bytes)
    }

    /// Read a fixed-size array
    pub fn read_array<const N: usize>(&mut self) -> ReadResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    /// Read everything left in the buffer
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let bytes = self.data[self.read_pos..].to_vec();
        self.read_pos = self.data.len();
        bytes
    }

    /// Read a string prefixed by a single length byte
    pub fn read_string8(&mut self) -> ReadResult<String> {
        let length = self.read_u8()? as usize;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::InvalidStringEncoding)
    }

    // ============ Writing ============

    /// Write an unsigned byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Write a boolean as 1 or 0
    pub fn write_bool(&mut self, value: bool) {
        self.data.put_u8(u8::from(value));
    }

    /// Write a big-endian u16
    pub fn write_u16(&mut self, value: u16) {
        self.data.put_u16(value);
    }

    /// Write a big-endian u32
    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32(value);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Write a string prefixed by a single length byte.
    ///
    /// Strings longer than 255 bytes are cut at the last character
    /// boundary that fits, so the result always decodes as UTF-8.
    pub fn write_string8(&mut self, value: &str) {
        let mut end = value.len().min(MAX_STRING8_LEN);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.data.put_u8(end as u8);
        self.data.put_slice(&value.as_bytes()[..end]);
    }
}

impl From<Vec<u8>> for PacketBuffer {
    fn from(vec: Vec<u8>) -> Self {
        Self::from_bytes(&vec)
    }
}

impl From<&[u8]> for PacketBuffer {
    fn from(slice: &[u8]) -> Self {
        Self::from_bytes(slice)
    }
}

impl AsRef<[u8]> for PacketBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_read_write() {
        let mut buf = PacketBuffer::new();
        buf.write_u8(0xAB);
        buf.write_u16(0x1234);
        buf.write_u32(0xDEADBEEF);
        buf.write_bool(true);

        assert_eq!(buf.as_bytes(), &[0xAB, 0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF, 0x01]);

        assert_eq!(buf.read_u8().unwrap(), 0xAB);
        assert_eq!(buf.read_u16().unwrap(), 0x1234);
        assert_eq!(buf.read_u32().unwrap(), 0xDEADBEEF);
        assert!(buf.read_bool().unwrap());
        assert!(!buf.has_remaining());
    }

    #[test]
    fn test_truncated_read() {
        let mut buf = PacketBuffer::from_bytes(&[0x01]);
        let err = buf.read_u32().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                needed: 4,
                remaining: 1
            }
        );
        // Failed reads leave the cursor where it was
        assert_eq!(buf.read_position(), 0);
        assert_eq!(buf.read_u8().unwrap(), 0x01);
    }

    #[test]
    fn test_string8() {
        let mut buf = PacketBuffer::new();
        buf.write_string8("Goes Here");
        assert_eq!(buf.as_bytes()[0], 9);
        assert_eq!(buf.read_string8().unwrap(), "Goes Here");
    }

    #[test]
    fn test_string8_truncated_body() {
        let mut buf = PacketBuffer::from_bytes(&[5, b'a', b'b']);
        assert!(matches!(
            buf.read_string8(),
            Err(ProtocolError::Truncated { needed: 5, .. })
        ));
    }

    #[test]
    fn test_string8_invalid_utf8() {
        let mut buf = PacketBuffer::from_bytes(&[2, 0xFF, 0xFE]);
        assert_eq!(buf.read_string8(), Err(ProtocolError::InvalidStringEncoding));
    }

    #[test]
    fn test_string8_long_input_is_clamped() {
        let long = "é".repeat(200);
        let mut buf = PacketBuffer::new();
        buf.write_string8(&long);

        let decoded = buf.read_string8().unwrap();
        assert_eq!(decoded.len(), 254);
        assert!(long.starts_with(&decoded));
    }

    #[test]
    fn test_array_and_remaining() {
        let mut buf = PacketBuffer::from_bytes(&[127, 0, 0, 1, 9, 9]);
        assert_eq!(buf.read_array::<4>().unwrap(), [127, 0, 0, 1]);
        assert_eq!(buf.remaining(), 2);
        assert_eq!(buf.read_remaining(), vec![9, 9]);
        assert_eq!(buf.remaining(), 0);
    }
}
