//! WebSocket Transport
//!
//! tokio-tungstenite adapter for the [`StreamTransport`] and
//! [`StreamSocket`] ports.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::application::ports::{CloseReason, Frame, StreamSocket, StreamTransport, TransportError};

/// Default time allowed for the TCP/TLS/WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for the close handshake before the socket is dropped.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens WebSocket connections with tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
    close_timeout: Duration,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl WsTransport {
    /// Create a transport with the given handshake timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Override the close handshake timeout.
    #[must_use]
    pub const fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn StreamSocket>, TransportError> {
        let handshake = tokio_tungstenite::connect_async(url.as_str());

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                TransportError::Connect(format!(
                    "handshake timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Box::new(WsSocket::new(stream, self.close_timeout)))
    }
}

/// An open tokio-tungstenite connection.
pub struct WsSocket<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
    close_timeout: Duration,
}

impl<S> WsSocket<S> {
    const fn new(stream: WebSocketStream<S>, close_timeout: Duration) -> Self {
        Self {
            stream,
            close_timeout,
        }
    }
}

#[async_trait]
impl<S> StreamSocket for WsSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_text(&mut self, payload: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        match self.stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Frame::Text(text.to_string())),
            Some(Ok(Message::Binary(bytes))) => Ok(Frame::Binary(bytes.to_vec())),
            Some(Ok(Message::Ping(data))) => {
                self.stream
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| TransportError::Send(e.to_string()))?;
                Ok(Frame::Control)
            }
            Some(Ok(Message::Pong(_))) => Ok(Frame::Control),
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(
                    code = ?frame.as_ref().map(|f| f.code),
                    "Server sent close frame"
                );
                Err(TransportError::Closed)
            }
            Some(Ok(Message::Frame(_))) => Ok(Frame::Unsupported),
            Some(Err(e)) => Err(TransportError::Receive(e.to_string())),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self, reason: CloseReason) {
        let code = match reason {
            CloseReason::GoingAway => CloseCode::Away,
        };
        let frame = CloseFrame {
            code,
            reason: String::from("going away").into(),
        };

        match tokio::time::timeout(self.close_timeout, self.stream.close(Some(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Close handshake failed"),
            Err(_) => tracing::debug!(
                timeout_ms = self.close_timeout.as_millis(),
                "Close handshake timed out, dropping socket"
            ),
        }
    }
}
