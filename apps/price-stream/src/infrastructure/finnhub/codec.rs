//! Stream Codec Module
//!
//! Decodes raw inbound frames into [`InboundEnvelope`]s. Outbound subscribe
//! payloads are built by the subscription manager.
//!
//! Decoding is a pure function of the frame. A [`CodecError`] is an
//! expected outcome for keep-alive and other non-JSON frames; callers drop
//! such frames instead of treating them as failures.

use crate::application::ports::Frame;
use crate::domain::streaming::{InboundEnvelope, PriceQuote};
use crate::infrastructure::finnhub::messages::{ERROR_TYPE, InboundMessage, TRADE_TYPE, TradeData};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary frame is not valid UTF-8.
    #[error("binary frame is not UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Payload is not a JSON object.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Transport delivered a frame of unknown shape.
    #[error("unsupported frame")]
    UnsupportedFrame,
}

/// JSON codec for the quote stream.
#[derive(Debug, Default, Clone)]
pub struct FinnhubCodec;

impl FinnhubCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON object or does not
    /// match the message schema.
    pub fn decode(&self, text: &str) -> Result<InboundEnvelope, CodecError> {
        let trimmed = text.trim();

        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                truncate(trimmed, 50)
            )));
        }

        let message: InboundMessage = serde_json::from_str(trimmed)?;

        let envelope = match message.msg_type.as_str() {
            TRADE_TYPE => InboundEnvelope::Trade {
                trades: message
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(to_quote)
                    .collect(),
            },
            ERROR_TYPE => InboundEnvelope::Error {
                message: message.msg.unwrap_or_default(),
            },
            _ => InboundEnvelope::Other,
        };

        Ok(envelope)
    }

    /// Decode a transport frame.
    ///
    /// Binary frames are decoded as UTF-8 text first. Control frames decode
    /// to [`InboundEnvelope::Other`].
    ///
    /// # Errors
    ///
    /// Returns an error for non-UTF-8 binary frames, unsupported frames and
    /// anything [`FinnhubCodec::decode`] rejects.
    pub fn decode_frame(&self, frame: &Frame) -> Result<InboundEnvelope, CodecError> {
        match frame {
            Frame::Text(text) => self.decode(text),
            Frame::Binary(bytes) => self.decode(std::str::from_utf8(bytes)?),
            Frame::Control => Ok(InboundEnvelope::Other),
            Frame::Unsupported => Err(CodecError::UnsupportedFrame),
        }
    }
}

/// Prices are non-negative; anything else is dropped.
fn to_quote(trade: TradeData) -> Option<PriceQuote> {
    (trade.price.is_finite() && trade.price >= 0.0)
        .then(|| PriceQuote::new(trade.symbol, trade.price))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
