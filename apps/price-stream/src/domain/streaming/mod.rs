//! Market Data Streaming Types
//!
//! Core domain types for live price streaming: instruments, price quotes,
//! decoded inbound envelopes and the connection lifecycle state.
//! These types are codec-agnostic and represent the canonical
//! internal representation of streamed prices.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Instrument
// =============================================================================

/// Exchange-qualified instrument identifier (e.g. `BINANCE:BTCUSDT`).
///
/// Opaque to the core: it is only compared, hashed and echoed back on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    /// Create a new instrument identifier.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Get the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

impl From<String> for Instrument {
    fn from(symbol: String) -> Self {
        Self(symbol)
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Price Quote
// =============================================================================

/// Price assigned to an instrument before its first tick arrives.
pub const NO_PRICE: f64 = 0.0;

/// Latest known price for an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Instrument the price belongs to.
    pub instrument: Instrument,
    /// Last traded price; [`NO_PRICE`] until the first tick.
    ///
    /// Zero is also a legal traded price, so this field alone cannot tell
    /// whether a tick has arrived. See `PriceStore::priced_count`.
    pub price: f64,
}

impl PriceQuote {
    /// Create a new quote.
    #[must_use]
    pub fn new(instrument: impl Into<Instrument>, price: f64) -> Self {
        Self {
            instrument: instrument.into(),
            price,
        }
    }

    /// Create the placeholder quote held before any tick arrives.
    #[must_use]
    pub fn empty(instrument: Instrument) -> Self {
        Self {
            instrument,
            price: NO_PRICE,
        }
    }
}

// =============================================================================
// Inbound Envelope
// =============================================================================

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    /// Trade ticks carrying new prices.
    Trade {
        /// Quotes in the order they appeared in the frame.
        trades: Vec<PriceQuote>,
    },
    /// Error reported by the server (e.g. unknown symbol).
    Error {
        /// Server supplied message.
        message: String,
    },
    /// Any other well-formed message (pings, acknowledgements, news).
    Other,
}

impl InboundEnvelope {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Trade { .. } => "trade",
            Self::Error { .. } => "error",
            Self::Other => "other",
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket; initial and terminal state.
    #[default]
    Disconnected,
    /// Opening the socket.
    Connecting,
    /// Socket open, subscribe frames being sent.
    Subscribing,
    /// Receive loop running.
    Streaming,
    /// Socket torn down, waiting to reconnect.
    Reconnecting,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Numeric code used for the connection state gauge.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Subscribing => 2,
            Self::Streaming => 3,
            Self::Reconnecting => 4,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
