//! Transport abstraction module
//!
//! Provides a unified interface for TCP and WebSocket connections, allowing
//! the server to handle both native clients (TCP) and browser clients
//! (WebSocket) with the same framing and dispatch code.

use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{NetworkError, Result, WorldsyncError};
use crate::net::frame::Frame;

/// Maximum read buffer size (64KB)
const MAX_BUFFER_SIZE: usize = 65536;

/// WebSocket transport for browser clients
pub struct WebSocketTransport {
    stream: WebSocketStream<TcpStream>,
}

impl WebSocketTransport {
    /// Run the WebSocket handshake on an accepted TCP stream
    pub async fn accept(stream: TcpStream) -> Result<Self> {
        let stream = accept_async(stream)
            .await
            .map_err(|e| WorldsyncError::Network(NetworkError::WebSocket(e.to_string())))?;
        Ok(Self { stream })
    }

    /// Read the next data message. `None` means the peer closed.
    pub async fn read_message(&mut self) -> Result<Option<Vec<u8>>> {
        // Loop over control frames
        loop {
            match self.stream.next().await {
                Some(Ok(message)) => match message {
                    Message::Binary(data) => {
                        trace!(len = data.len(), "Received binary WebSocket message");
                        return Ok(Some(data));
                    }
                    Message::Close(_) => {
                        debug!("WebSocket close message received");
                        return Ok(None);
                    }
                    Message::Ping(data) => {
                        if let Err(e) = self.stream.send(Message::Pong(data)).await {
                            warn!("Failed to send pong: {}", e);
                        }
                    }
                    Message::Text(text) => {
                        // Frames are binary either way
                        return Ok(Some(text.into_bytes()));
                    }
                    Message::Pong(_) | Message::Frame(_) => {}
                },
                Some(Err(e)) => {
                    return Err(WorldsyncError::Network(NetworkError::WebSocket(
                        e.to_string(),
                    )));
                }
                None => return Ok(None),
            }
        }
    }

    /// Write a binary message to the WebSocket
    pub async fn write_message(&mut self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "Sending binary WebSocket message");
        self.stream
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| WorldsyncError::Network(NetworkError::WebSocket(e.to_string())))
    }

    /// Close the WebSocket connection gracefully
    pub async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| WorldsyncError::Network(NetworkError::WebSocket(e.to_string())))
    }
}

fn read_error(e: std::io::Error) -> WorldsyncError {
    WorldsyncError::Network(NetworkError::ReadError(e.to_string()))
}

fn write_error(e: std::io::Error) -> WorldsyncError {
    WorldsyncError::Network(NetworkError::WriteError(e.to_string()))
}

/// A native TCP client or a browser WebSocket client
pub enum UnifiedTransport {
    Tcp(TcpStream),
    WebSocket(WebSocketTransport),
}

impl UnifiedTransport {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }

    pub fn websocket(transport: WebSocketTransport) -> Self {
        Self::WebSocket(transport)
    }

    pub fn is_websocket(&self) -> bool {
        matches!(self, Self::WebSocket(_))
    }

    /// Append whatever arrives next to `buf`, returning the byte count.
    /// Zero means the connection closed.
    async fn read_into(&mut self, buf: &mut BytesMut) -> Result<usize> {
        match self {
            Self::Tcp(stream) => {
                let mut temp = [0u8; 4096];
                let n = stream.read(&mut temp).await.map_err(read_error)?;
                buf.extend_from_slice(&temp[..n]);
                Ok(n)
            }
            Self::WebSocket(ws) => match ws.read_message().await? {
                Some(data) => {
                    buf.extend_from_slice(&data);
                    Ok(data.len())
                }
                None => Ok(0),
            },
        }
    }

    /// Write one batch. A WebSocket batch goes out as one binary message.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Self::Tcp(stream) => stream.write_all(buf).await.map_err(write_error),
            Self::WebSocket(ws) => ws.write_message(buf).await,
        }
    }

    pub async fn flush(&mut self) -> Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush().await.map_err(write_error),
            Self::WebSocket(_) => Ok(()),
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown().await.map_err(write_error),
            Self::WebSocket(ws) => ws.close().await,
        }
    }
}

/// Buffered transport wrapper that reads whole frames and batches writes
pub struct BufferedTransport {
    transport: UnifiedTransport,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
}

impl BufferedTransport {
    /// Create a new buffered transport
    pub fn new(transport: UnifiedTransport) -> Self {
        Self {
            transport,
            read_buffer: BytesMut::with_capacity(MAX_BUFFER_SIZE),
            write_buffer: BytesMut::with_capacity(MAX_BUFFER_SIZE),
        }
    }

    /// Check if this is a WebSocket transport
    pub fn is_websocket(&self) -> bool {
        self.transport.is_websocket()
    }

    /// Read the next complete frame.
    ///
    /// Cancel safe: bytes are only moved into the read buffer once a read
    /// completes, so dropping the future loses nothing.
    pub async fn read_frame(&mut self, with_ordinal: bool) -> Result<Frame> {
        loop {
            if let Some(frame) = Frame::decode(&mut self.read_buffer, with_ordinal)? {
                return Ok(frame);
            }

            let n = self.transport.read_into(&mut self.read_buffer).await?;
            if n == 0 {
                return Err(WorldsyncError::Network(NetworkError::ConnectionClosed));
            }
        }
    }

    /// Queue data to be written
    pub fn queue_write(&mut self, data: &[u8]) {
        self.write_buffer.extend_from_slice(data);
    }

    /// Flush all queued writes
    pub async fn flush(&mut self) -> Result<()> {
        if !self.write_buffer.is_empty() {
            let data = self.write_buffer.split().to_vec();
            self.transport.write_all(&data).await?;
        }
        self.transport.flush().await
    }

    /// Shutdown the transport
    pub async fn shutdown(&mut self) -> Result<()> {
        self.flush().await?;
        self.transport.shutdown().await
    }
}
