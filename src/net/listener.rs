//! Listener abstraction
//!
//! A listener owns a dispatch table and reacts to connection lifecycle
//! events. The connection handler drives any listener the same way.

use std::sync::Arc;

use crate::error::Result;
use crate::net::session::Session;
use crate::protocol::dispatch::PacketDispatcher;

pub trait Listener: Send + Sync + Sized + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Handler table built when the listener was constructed
    fn dispatcher(&self) -> &PacketDispatcher<Self>;

    /// Called once the session is registered, before any frame is read
    fn on_connect(&self, session: &Arc<Session>) -> Result<()>;

    /// Called exactly once when the connection ends, for any reason
    fn on_disconnect(&self, session: &Arc<Session>);
}
