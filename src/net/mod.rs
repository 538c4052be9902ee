//! Networking module
//!
//! This module handles all network-related functionality for the Worldsync server:
//! - Payload buffers and wire framing
//! - TCP socket handling for native clients
//! - WebSocket handling for browser clients
//! - Session management
//! - Connection lifecycle shared by every listener

pub mod buffer;
pub mod frame;
pub mod handler;
pub mod listener;
pub mod session;
pub mod transport;
