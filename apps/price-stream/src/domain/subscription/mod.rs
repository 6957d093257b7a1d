//! Subscription Management Types
//!
//! Tracks the fixed, ordered set of instruments the client streams and
//! produces the subscribe frames sent on every (re)connect.
//!
//! # Design
//!
//! The server does not keep subscriptions across connections, so the
//! frames are rebuilt from the tracked set each time a socket opens.
//! The protocol is fire-and-forget: no acknowledgement is awaited.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::streaming::Instrument;

// =============================================================================
// Wire Type
// =============================================================================

/// Outbound subscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","symbol":"BINANCE:BTCUSDT"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Request type (always "subscribe").
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Instrument to stream.
    pub symbol: Instrument,
}

impl SubscribeRequest {
    /// Create a subscribe request for one instrument.
    #[must_use]
    pub fn subscribe(symbol: Instrument) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            symbol,
        }
    }

    /// Serialize to the JSON text payload.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Invalid instrument set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// No instruments configured.
    #[error("at least one instrument must be configured")]
    Empty,
    /// The same instrument appears more than once.
    #[error("duplicate instrument: {0}")]
    Duplicate(Instrument),
}

// =============================================================================
// Subscription Manager
// =============================================================================

/// Holds the instruments to stream, in configured order.
///
/// # Example
///
/// ```rust
/// use price_stream::domain::subscription::SubscriptionManager;
///
/// let manager = SubscriptionManager::new(["BINANCE:BTCUSDT", "OANDA:EUR_USD"]).unwrap();
/// let frames = manager.subscribe_frames().unwrap();
///
/// assert_eq!(frames.len(), 2);
/// assert_eq!(frames[0].1, r#"{"type":"subscribe","symbol":"BINANCE:BTCUSDT"}"#);
/// ```
#[derive(Debug, Clone)]
pub struct SubscriptionManager {
    instruments: Vec<Instrument>,
}

impl SubscriptionManager {
    /// Create a manager for the given instruments.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty or contains duplicates.
    pub fn new<I, S>(instruments: I) -> Result<Self, SubscriptionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Instrument>,
    {
        let instruments: Vec<Instrument> = instruments.into_iter().map(Into::into).collect();

        if instruments.is_empty() {
            return Err(SubscriptionError::Empty);
        }

        let mut seen = HashSet::with_capacity(instruments.len());
        for instrument in &instruments {
            if !seen.insert(instrument) {
                return Err(SubscriptionError::Duplicate(instrument.clone()));
            }
        }

        Ok(Self { instruments })
    }

    /// Tracked instruments in configured order.
    #[must_use]
    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Always false for a constructed manager.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Check whether an instrument is tracked.
    #[must_use]
    pub fn contains(&self, instrument: &Instrument) -> bool {
        self.instruments.contains(instrument)
    }

    /// Build one subscribe payload per instrument, in configured order.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn subscribe_frames(&self) -> Result<Vec<(Instrument, String)>, serde_json::Error> {
        self.instruments
            .iter()
            .map(|instrument| {
                SubscribeRequest::subscribe(instrument.clone())
                    .to_json()
                    .map(|json| (instrument.clone(), json))
            })
            .collect()
    }
}
