//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - Initial connection setup (TCP or WebSocket)
//! - Session registration and the listener's connect hook
//! - Frame reading, decryption and dispatch
//! - Draining the session's outbound queue to the socket
//! - Handshake deadline enforcement
//! - Graceful disconnection
//!
//! Any error ends the connection it came from and nothing else. A closed
//! connection is logged at debug, everything else at warn.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::error::{NetworkError, Result};
use crate::net::listener::Listener;
use crate::net::session::{Session, SessionManager, SessionState};
use crate::net::transport::{BufferedTransport, UnifiedTransport, WebSocketTransport};

/// Outbound frames a session may have queued before sends are dropped
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// Drives connections for one listener
pub struct ConnectionHandler<L: Listener> {
    listener: Arc<L>,
    sessions: Arc<SessionManager>,
    /// Time allowed to finish the handshake
    handshake_timeout: Duration,
}

impl<L: Listener> ConnectionHandler<L> {
    /// Create a new connection handler
    pub fn new(listener: Arc<L>, sessions: Arc<SessionManager>, handshake_timeout: Duration) -> Self {
        Self {
            listener,
            sessions,
            handshake_timeout,
        }
    }

    pub fn listener(&self) -> &Arc<L> {
        &self.listener
    }

    /// Handle a TCP connection (native client)
    pub async fn handle_tcp(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(listener = self.listener.name(), address = %addr, "Handling TCP connection");

        stream.set_nodelay(true)?;
        let transport = BufferedTransport::new(UnifiedTransport::tcp(stream));

        self.handle_connection(transport, addr, false).await
    }

    /// Handle a WebSocket connection (browser client)
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(listener = self.listener.name(), address = %addr, "Handling WebSocket connection");

        stream.set_nodelay(true)?;
        let ws = WebSocketTransport::accept(stream).await?;

        info!(address = %addr, "WebSocket connection established");
        let transport = BufferedTransport::new(UnifiedTransport::websocket(ws));

        self.handle_connection(transport, addr, true).await
    }

    /// Register the session, run it to completion, then clean up
    async fn handle_connection(
        &self,
        mut transport: BufferedTransport,
        addr: SocketAddr,
        is_websocket: bool,
    ) -> Result<()> {
        let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE);
        let session =
            self.sessions
                .create_session_with_channel(addr, is_websocket, outbound_tx)?;

        debug!(
            listener = self.listener.name(),
            session_id = session.id,
            address = %session.address,
            "Starting connection handler"
        );

        let result = match self.listener.on_connect(&session) {
            Ok(()) => {
                self.process_connection(&mut transport, &session, &mut outbound_rx)
                    .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => debug!(session_id = session.id, "Connection finished"),
            Err(e) if e.is_connection_closed() => {
                debug!(session_id = session.id, "Connection closed")
            }
            Err(e) => warn!(
                listener = self.listener.name(),
                session_id = session.id,
                state = %session.state(),
                error = %e,
                "Connection error"
            ),
        }

        // Cleanup
        self.listener.on_disconnect(&session);
        session.set_state(SessionState::Disconnected);
        self.sessions.remove(session.id);

        if let Err(e) = transport.shutdown().await {
            trace!(session_id = session.id, error = %e, "Error during transport shutdown");
        }

        Ok(())
    }

    /// Read, dispatch and flush until the session ends
    async fn process_connection(
        &self,
        transport: &mut BufferedTransport,
        session: &Arc<Session>,
        outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
    ) -> Result<()> {
        let deadline = Instant::now() + self.handshake_timeout;

        loop {
            // Everything queued so far goes out before we look at state, so
            // a redirect reaches the client before the close
            while let Ok(bytes) = outbound_rx.try_recv() {
                transport.queue_write(&bytes);
            }
            transport.flush().await?;

            if !session.is_active() {
                debug!(
                    session_id = session.id,
                    state = %session.state(),
                    "Session no longer active"
                );
                return Ok(());
            }

            let handshaking = session.state().is_handshaking();

            tokio::select! {
                frame = transport.read_frame(session.cipher_enabled()) => {
                    let mut frame = frame?;
                    session.open_frame(&mut frame);
                    trace!(
                        session_id = session.id,
                        opcode = frame.opcode,
                        len = frame.payload.len(),
                        "Received frame"
                    );
                    self.listener.dispatcher().dispatch(
                        self.listener.as_ref(),
                        session,
                        frame.opcode,
                        &frame.payload,
                    )?;
                }
                Some(bytes) = outbound_rx.recv() => {
                    transport.queue_write(&bytes);
                }
                _ = sleep_until(deadline), if handshaking => {
                    warn!(
                        session_id = session.id,
                        state = %session.state(),
                        "Handshake timed out"
                    );
                    return Err(NetworkError::Timeout.into());
                }
            }
        }
    }
}

/// Accept connections for one listener until shutdown
pub async fn accept_connections<L: Listener>(
    listener: TcpListener,
    handler: Arc<ConnectionHandler<L>>,
    websocket: bool,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let name = handler.listener().name();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!(listener = name, websocket = websocket, "New connection from: {}", addr);
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let result = if websocket {
                                handler.handle_websocket(stream, addr).await
                            } else {
                                handler.handle_tcp(stream, addr).await
                            };
                            if let Err(e) = result {
                                warn!(listener = name, "Connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!(listener = name, "Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!(listener = name, "Connection acceptor shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::gateway::GatewayListener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn spawn_gateway(
        timeout: Duration,
    ) -> (SocketAddr, Arc<SessionManager>, broadcast::Sender<()>) {
        spawn_gateway_on(timeout, false).await
    }

    async fn spawn_gateway_on(
        timeout: Duration,
        websocket: bool,
    ) -> (SocketAddr, Arc<SessionManager>, broadcast::Sender<()>) {
        let gateway = Arc::new(GatewayListener::from_config(&ServerConfig::default()).unwrap());
        let sessions = Arc::new(SessionManager::new());
        let handler = Arc::new(ConnectionHandler::new(gateway, sessions.clone(), timeout));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(accept_connections(listener, handler, websocket, shutdown_rx));
        (addr, sessions, shutdown_tx)
    }

    async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; 3];
        stream.read_exact(&mut header).await.unwrap();
        assert_eq!(header[0], 0xAA);
        let len = u16::from_be_bytes([header[1], header[2]]) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        (body[0], body[1..].to_vec())
    }

    #[tokio::test]
    async fn test_banner_on_connect() {
        let (addr, _sessions, _shutdown) = spawn_gateway(Duration::from_secs(5)).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let (opcode, payload) = read_frame(&mut client).await;
        assert_eq!(opcode, 0x7E);
        assert_eq!(payload[0], 0x1B);
        assert_eq!(&payload[1..], b"CONNECTED SERVER\n");
    }

    #[tokio::test]
    async fn test_banner_over_websocket() {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        let (addr, sessions, _shutdown) = spawn_gateway_on(Duration::from_secs(5), true).await;
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();

        let message = ws.next().await.unwrap().unwrap();
        let Message::Binary(bytes) = message else {
            panic!("expected a binary message, got {:?}", message);
        };
        assert_eq!(&bytes[..4], &[0xAA, 0x00, 0x13, 0x7E]);
        assert_eq!(bytes[4], 0x1B);
        assert_eq!(sessions.count(), 1);
    }

    #[tokio::test]
    async fn test_handshake_timeout_closes_connection() {
        let (addr, sessions, _shutdown) = spawn_gateway(Duration::from_millis(50)).await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        read_frame(&mut client).await;

        let mut rest = Vec::new();
        let n = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sessions.count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_only_that_connection() {
        let (addr, sessions, _shutdown) = spawn_gateway(Duration::from_secs(5)).await;

        let mut good = TcpStream::connect(addr).await.unwrap();
        read_frame(&mut good).await;
        let mut bad = TcpStream::connect(addr).await.unwrap();
        read_frame(&mut bad).await;

        bad.write_all(&[0x13, 0x37, 0x00]).await.unwrap();
        let mut rest = Vec::new();
        bad.read_to_end(&mut rest).await.unwrap();

        // The other connection still works
        good.write_all(&[0xAA, 0x00, 0x03, 0x00, 0x02, 0xE5])
            .await
            .unwrap();
        let (opcode, payload) = read_frame(&mut good).await;
        assert_eq!(opcode, 0x00);
        assert_eq!(payload[0], 1);
        assert_eq!(sessions.count(), 1);
    }
}
