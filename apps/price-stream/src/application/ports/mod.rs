//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamTransport`: Opens WebSocket connections to the quote endpoint
//! - `StreamSocket`: One open connection (send, receive, close)

use async_trait::async_trait;
use url::Url;

// =============================================================================
// Frames
// =============================================================================

/// A frame received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload, expected to hold UTF-8 text.
    Binary(Vec<u8>),
    /// Protocol control frame (ping/pong), handled by the transport.
    Control,
    /// Frame shape the transport could not classify.
    Unsupported,
}

/// Reason given when closing a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Endpoint is going away (client teardown or reconnect).
    GoingAway,
}

// =============================================================================
// Errors
// =============================================================================

/// Transport-level failures. All of them are recoverable by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Socket could not be opened.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Frame could not be sent.
    #[error("send failed: {0}")]
    Send(String),
    /// Reading from the socket failed.
    #[error("receive failed: {0}")]
    Receive(String),
    /// Peer closed the connection or the stream ended.
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Closed => "closed",
        }
    }
}

// =============================================================================
// Ports
// =============================================================================

/// One open streaming connection.
#[async_trait]
pub trait StreamSocket: Send {
    /// Send a text frame.
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError>;

    /// Wait for the next frame.
    ///
    /// Returns [`TransportError::Closed`] once the peer has closed the stream.
    async fn recv(&mut self) -> Result<Frame, TransportError>;

    /// Close the connection. Errors are swallowed; the socket is unusable afterwards.
    async fn close(&mut self, reason: CloseReason);
}

/// Factory for streaming connections.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn StreamSocket>, TransportError>;
}
