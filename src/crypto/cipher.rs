//! Per-session packet obfuscation
//!
//! Each session gets a seed in `0..=9` and a 9-byte key during the version
//! handshake. The seed selects one of ten salt tables; payload bytes are
//! XORed against the key, the salt table and the frame's ordinal. XOR makes
//! the transform its own inverse, so the same call encrypts and decrypts.
//!
//! Opcodes and framing are never obfuscated.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::ProtocolError;

/// Number of distinct salt tables
pub const SEED_COUNT: u8 = 10;

/// Length of a session key in bytes
pub const KEY_LENGTH: usize = 9;

/// Seed and key handed to the client in the connection info packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub seed: u8,
    pub key: String,
}

impl SessionKey {
    /// Generate fresh random material for a new session
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let seed = rng.gen_range(0..SEED_COUNT);
        let key: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(KEY_LENGTH)
            .map(char::from)
            .collect();
        Self { seed, key }
    }

    /// Build the cipher keyed by this material
    pub fn cipher(&self) -> Result<PacketCipher, ProtocolError> {
        PacketCipher::new(self.seed, self.key.as_bytes())
    }
}

/// Salt-and-key XOR cipher for frame payloads
#[derive(Clone)]
pub struct PacketCipher {
    key: [u8; KEY_LENGTH],
    salt: [u8; 256],
}

impl PacketCipher {
    /// Create a cipher from a seed and a 9-byte key
    pub fn new(seed: u8, key: &[u8]) -> Result<Self, ProtocolError> {
        if seed >= SEED_COUNT {
            return Err(ProtocolError::InvalidCipherSeed(seed));
        }
        let key: [u8; KEY_LENGTH] = key
            .try_into()
            .map_err(|_| ProtocolError::InvalidCipherKey(key.len()))?;
        Ok(Self {
            key,
            salt: salt_table(seed),
        })
    }

    /// Apply the transform in place. Calling it twice with the same
    /// ordinal restores the original bytes.
    pub fn apply(&self, data: &mut [u8], ordinal: u8) {
        let ordinal_salt = self.salt[ordinal as usize];
        for (i, byte) in data.iter_mut().enumerate() {
            let block = (i / KEY_LENGTH) % 256;
            *byte ^= self.key[i % KEY_LENGTH];
            *byte ^= self.salt[block];
            if block != ordinal as usize {
                *byte ^= ordinal_salt;
            }
        }
    }
}

impl std::fmt::Debug for PacketCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketCipher").finish_non_exhaustive()
    }
}

/// Build the salt table for a seed
fn salt_table(seed: u8) -> [u8; 256] {
    let mut table = [0u8; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        let i = i as i32;
        let value = match seed {
            0 => i,
            1 => {
                let sign = if i % 2 != 0 { -1 } else { 1 };
                sign * ((i + 1) / 2) + 128
            }
            2 => 255 - i,
            3 => {
                let sign = if i % 2 != 0 { -1 } else { 1 };
                sign * ((255 - i) / 2) + 128
            }
            4 => (i / 16) * (i / 16),
            5 => 2 * i % 256,
            6 => 255 - 2 * i % 256,
            7 => {
                if i > 127 {
                    2 * i - 256
                } else {
                    255 - 2 * i
                }
            }
            8 => {
                if i > 127 {
                    511 - 2 * i
                } else {
                    2 * i
                }
            }
            _ => 255 - ((i - 128) / 8) * ((i - 128) / 8) % 256,
        };
        *slot = value.rem_euclid(256) as u8;
    }
    table
}
