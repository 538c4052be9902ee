//! Gateway module
//!
//! The login-facing listener: version check, server table delivery and
//! redirect to a world server.

pub mod listener;
pub mod server_table;

pub use listener::GatewayListener;
pub use server_table::{ServerTable, ServerTableEntry};
