//! Finnhub WebSocket Message Types
//!
//! Wire format types for deserializing messages from the streaming quote
//! endpoint. These types map directly to the JSON message schema.
//!
//! # Message Types
//!
//! - `trade`: One or more trade ticks in `data`
//! - `ping`: Keep-alive sent by the server
//! - `error`: Server side error (e.g. invalid symbol) in `msg`
//!
//! Any other `type` value is accepted and ignored.
//!
//! # References
//!
//! - [Trades - Last Price Updates](https://finnhub.io/docs/api/websocket-trades)

use serde::{Deserialize, Serialize};

/// Message type carrying trade ticks.
pub const TRADE_TYPE: &str = "trade";

/// Message type carrying a server error.
pub const ERROR_TYPE: &str = "error";

/// Top-level inbound message.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "trade",
///   "data": [
///     {"s": "BINANCE:BTCUSDT", "p": 7296.89, "t": 1575526691134, "v": 0.011467}
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Trade ticks; present for `trade` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<TradeData>>,

    /// Error description; present for `error` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// A single trade tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    /// Instrument symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Last price.
    #[serde(rename = "p")]
    pub price: f64,

    /// Trade time in UNIX milliseconds.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,

    /// Traded volume.
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}
