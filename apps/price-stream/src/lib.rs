#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Price Stream - Live Price Client
//!
//! Keeps one WebSocket connection to the Finnhub trade stream, subscribes to
//! a fixed set of instruments, and maintains the latest traded price for
//! each. Consumers read snapshots and are notified when prices change.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming logic and data types
//!   - `streaming`: Instruments, quotes, decoded envelopes, connection state
//!   - `subscription`: Tracked instrument set and subscribe frames
//!   - `prices`: Latest price per instrument with change notification
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport and socket interfaces
//!   - `services`: `PriceStreamClient` facade
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `finnhub`: Codec, reconnect policy, WebSocket transport, connection
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! Finnhub WS ──► StreamConnection ──► FinnhubCodec ──► PriceStore ──► changes()
//!                    ▲                                                    │
//!                    └── SubscriptionManager (on every connect)           ▼
//!                                                                    snapshot()
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::prices::{PriceStore, StoreError};
pub use domain::streaming::{ConnectionState, InboundEnvelope, Instrument, NO_PRICE, PriceQuote};
pub use domain::subscription::{SubscribeRequest, SubscriptionError, SubscriptionManager};

// Ports
pub use application::ports::{CloseReason, Frame, StreamSocket, StreamTransport, TransportError};

// Client facade
pub use application::services::{ClientError, PriceStreamClient};

// Infrastructure config
pub use infrastructure::config::{
    ApiToken, ConfigError, ServerSettings, StreamConfig, WebSocketSettings,
};

// Stream connection
pub use infrastructure::finnhub::{
    ConnectionSettings, ConnectionStats, Endpoint, EndpointError, FinnhubCodec, ReconnectConfig,
    StreamConnection, StreamError, WsTransport,
};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
