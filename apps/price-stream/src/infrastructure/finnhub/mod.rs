//! Finnhub Streaming Adapters
//!
//! WebSocket client for the Finnhub trade stream.
//!
//! # Protocol
//!
//! 1. Connect to `wss://ws.finnhub.io?token=<token>`
//! 2. Send one `{"type":"subscribe","symbol":"<instrument>"}` per instrument
//! 3. Receive `{"type":"trade","data":[{"s":..,"p":..}, ..]}` frames
//!
//! There is no subscription acknowledgement; the server reports problems
//! with `{"type":"error","msg":".."}`.

pub mod codec;
pub mod connection;
pub mod endpoint;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use codec::{CodecError, FinnhubCodec};
pub use connection::{ConnectionSettings, ConnectionStats, StreamConnection, StreamError};
pub use endpoint::{DEFAULT_STREAM_URL, Endpoint, EndpointError};
pub use reconnect::{DEFAULT_RECONNECT_DELAY, ReconnectConfig, ReconnectPolicy};
pub use transport::{DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, WsSocket, WsTransport};
