//! Packet dispatch tables
//!
//! Each listener builds one [`PacketDispatcher`] when it is constructed,
//! binding client opcodes to handler functions. Binding the same opcode
//! twice fails right there, so a misconfigured listener never starts.
//! At runtime an opcode without a handler is dropped with a warning and
//! the connection carries on.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::{DispatchError, Result};
use crate::net::session::Session;
use crate::protocol::opcodes::ClientOpcode;
use crate::protocol::packet::ClientPacket;

type Handler<L> = Box<dyn Fn(&L, &Arc<Session>, &[u8]) -> Result<()> + Send + Sync>;

/// Outcome of dispatching one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A handler decoded and processed the packet
    Handled,
    /// No handler is bound to the opcode; the packet was dropped
    Unknown,
}

/// Opcode to handler map for one listener type
pub struct PacketDispatcher<L> {
    listener: &'static str,
    handlers: HashMap<u8, Handler<L>>,
}

impl<L> PacketDispatcher<L> {
    /// Create an empty table for the named listener
    pub fn new(listener: &'static str) -> Self {
        Self {
            listener,
            handlers: HashMap::new(),
        }
    }

    /// Name of the listener this table belongs to
    pub fn listener(&self) -> &'static str {
        self.listener
    }

    /// Bind a handler to `P`'s opcode
    pub fn register<P, F>(&mut self, handler: F) -> std::result::Result<(), DispatchError>
    where
        P: ClientPacket + 'static,
        F: Fn(&L, &Arc<Session>, P) -> Result<()> + Send + Sync + 'static,
    {
        let opcode = P::opcode();
        if self.handlers.contains_key(&opcode) {
            return Err(DispatchError::DuplicateHandler {
                listener: self.listener,
                opcode,
            });
        }

        self.handlers.insert(
            opcode,
            Box::new(move |listener, session, payload| {
                let packet = P::decode(payload)?;
                handler(listener, session, packet)
            }),
        );
        Ok(())
    }

    /// Check whether an opcode has a handler
    pub fn is_registered(&self, opcode: ClientOpcode) -> bool {
        self.handlers.contains_key(&opcode.as_u8())
    }

    /// Number of bound opcodes
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Decode and handle one packet.
    ///
    /// Decode failures and handler errors are returned to the caller,
    /// which terminates the connection.
    pub fn dispatch(
        &self,
        listener: &L,
        session: &Arc<Session>,
        opcode: u8,
        payload: &[u8],
    ) -> Result<Dispatched> {
        let Some(handler) = self.handlers.get(&opcode) else {
            warn!(
                listener = self.listener,
                session_id = session.id,
                opcode = opcode,
                len = payload.len(),
                "Unknown opcode, packet dropped"
            );
            return Ok(Dispatched::Unknown);
        };

        trace!(
            listener = self.listener,
            session_id = session.id,
            opcode = opcode,
            len = payload.len(),
            "Dispatching packet"
        );
        handler(listener, session, payload)?;
        Ok(Dispatched::Handled)
    }
}
