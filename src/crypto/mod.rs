//! Cryptography module
//!
//! Per-session seed/key generation and the payload cipher keyed by it.

pub mod cipher;

// Re-export commonly used types
pub use cipher::{PacketCipher, SessionKey};
