//! Stream Connection
//!
//! Owns the socket lifecycle for the quote stream:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Subscribing ──sent──► Streaming
//!                                 ▲                                          │
//!                                 └──── delay ──── Reconnecting ◄── read error
//! ```
//!
//! `disconnect()` is valid from any state. It cancels a pending connect,
//! receive or reconnect delay; the lifecycle task then closes the socket
//! with a "going away" status and settles in `Disconnected` for the rest of
//! the session.
//!
//! Frames are handled strictly in receipt order on the lifecycle task.
//! Subscribe frames are fire-and-forget: no acknowledgement is awaited and a
//! failed send for one instrument does not abort the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;
use uuid::Uuid;

use super::codec::FinnhubCodec;
use super::endpoint::Endpoint;
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{CloseReason, Frame, StreamSocket, StreamTransport, TransportError};
use crate::domain::prices::PriceStore;
use crate::domain::streaming::{ConnectionState, InboundEnvelope};
use crate::domain::subscription::SubscriptionManager;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors returned by the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// `connect()` was called while the lifecycle task is already running.
    #[error("connection already started")]
    AlreadyStarted,

    /// `connect()` was called after `disconnect()`.
    #[error("connection has been disconnected")]
    Disconnected,

    /// Reconnect policy ran out of attempts.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),
}

// =============================================================================
// Settings
// =============================================================================

/// Connection behavior settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConnectionSettings {
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
    /// Treat a silent socket as failed after this long (`None` = wait forever).
    pub idle_timeout: Option<Duration>,
}

impl ConnectionSettings {
    /// Create settings from `WebSocketSettings`.
    #[must_use]
    pub fn from_websocket_settings(settings: &crate::WebSocketSettings) -> Self {
        Self {
            reconnect: ReconnectConfig::from_websocket_settings(settings),
            idle_timeout: settings.idle_timeout,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for one connection, across reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Sockets successfully opened.
    pub sessions_opened: u64,
    /// Data frames received (control frames excluded).
    pub frames_received: u64,
    /// Frames dropped because they could not be decoded.
    pub parse_failures: u64,
    /// Quotes written to the price store.
    pub trades_applied: u64,
    /// Quotes for instruments outside the tracked set.
    pub trades_ignored: u64,
    /// Subscribe frames that failed to send.
    pub subscribe_failures: u64,
    /// Reconnect attempts scheduled.
    pub reconnect_attempts: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sessions_opened: AtomicU64,
    frames_received: AtomicU64,
    parse_failures: AtomicU64,
    trades_applied: AtomicU64,
    trades_ignored: AtomicU64,
    subscribe_failures: AtomicU64,
    reconnect_attempts: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            trades_applied: self.trades_applied.load(Ordering::Relaxed),
            trades_ignored: self.trades_ignored.load(Ordering::Relaxed),
            subscribe_failures: self.subscribe_failures.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Stream Connection
// =============================================================================

/// How a single socket session ended.
#[derive(Debug)]
enum SessionOutcome {
    /// `disconnect()` was requested.
    Cancelled,
    /// Transport failure; `streamed` is true if the receive loop was reached.
    Failed {
        error: TransportError,
        streamed: bool,
    },
}

/// WebSocket connection to the quote stream.
///
/// Drives the [`SubscriptionManager`] on every (re)connect and applies
/// decoded trades to the [`PriceStore`].
pub struct StreamConnection {
    endpoint: Endpoint,
    transport: Arc<dyn StreamTransport>,
    subscriptions: Arc<SubscriptionManager>,
    store: Arc<PriceStore>,
    codec: FinnhubCodec,
    settings: ConnectionSettings,
    cancel: CancellationToken,
    finished: CancellationToken,
    started: AtomicBool,
    state: watch::Sender<ConnectionState>,
    counters: Counters,
}

impl StreamConnection {
    /// Create a new connection in the `Disconnected` state.
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        transport: Arc<dyn StreamTransport>,
        subscriptions: Arc<SubscriptionManager>,
        store: Arc<PriceStore>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            endpoint,
            transport,
            subscriptions,
            store,
            codec: FinnhubCodec::new(),
            settings,
            cancel: CancellationToken::new(),
            finished: CancellationToken::new(),
            started: AtomicBool::new(false),
            state: watch::channel(ConnectionState::Disconnected).0,
            counters: Counters::default(),
        }
    }

    /// Start the lifecycle task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task was already started or the connection
    /// has been disconnected.
    pub fn connect(self: &Arc<Self>) -> Result<JoinHandle<Result<(), StreamError>>, StreamError> {
        if self.cancel.is_cancelled() {
            return Err(StreamError::Disconnected);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StreamError::AlreadyStarted);
        }

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run().await }))
    }

    /// Request teardown. Idempotent and safe from any state.
    pub fn disconnect(&self) {
        if self.cancel.is_cancelled() {
            tracing::debug!("Disconnect already requested");
            return;
        }
        tracing::info!(state = %self.state(), "Disconnect requested");
        self.cancel.cancel();
        if !self.started.load(Ordering::SeqCst) {
            self.finished.cancel();
        }
    }

    /// Resolves once the lifecycle task has ended, for any reason.
    pub async fn finished(&self) {
        self.finished.cancelled().await;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.counters.snapshot()
    }

    /// Redacted endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn run(&self) -> Result<(), StreamError> {
        let mut policy = ReconnectPolicy::new(self.settings.reconnect.clone());

        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(());
            }

            let session_id = Uuid::new_v4();
            let session = self
                .run_session()
                .instrument(tracing::info_span!("stream_session", %session_id));

            match session.await {
                SessionOutcome::Cancelled => break Ok(()),
                SessionOutcome::Failed { error, streamed } => {
                    tracing::warn!(error = %error, streamed, "Quote stream connection error");
                    metrics::record_transport_error(&error);
                    if streamed {
                        policy.reset();
                    }
                }
            }

            self.set_state(ConnectionState::Reconnecting);

            let Some(delay) = policy.next_delay() else {
                tracing::error!(
                    attempts = policy.attempt_count(),
                    "Giving up on quote stream"
                );
                break Err(StreamError::MaxReconnectAttemptsExceeded(
                    policy.attempt_count(),
                ));
            };

            Counters::add(&self.counters.reconnect_attempts, 1);
            metrics::record_reconnect();
            tracing::info!(
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                "Reconnecting to quote stream"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Cancelled during reconnect delay");
                    break Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        };

        self.set_state(ConnectionState::Disconnected);
        self.finished.cancel();
        tracing::info!("Quote stream stopped");
        result
    }

    /// Open one socket, subscribe, and stream until failure or cancellation.
    async fn run_session(&self) -> SessionOutcome {
        self.set_state(ConnectionState::Connecting);
        tracing::info!(endpoint = %self.endpoint, "Connecting to quote stream");

        let connected = tokio::select! {
            () = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            result = self.transport.connect(self.endpoint.url()) => result,
        };
        let mut socket = match connected {
            Ok(socket) => socket,
            Err(error) => {
                return SessionOutcome::Failed {
                    error,
                    streamed: false,
                };
            }
        };
        Counters::add(&self.counters.sessions_opened, 1);

        self.set_state(ConnectionState::Subscribing);
        let subscribed = tokio::select! {
            () = self.cancel.cancelled() => false,
            () = self.send_subscriptions(socket.as_mut()) => true,
        };

        let outcome = if subscribed {
            self.set_state(ConnectionState::Streaming);
            tracing::info!(
                instruments = self.subscriptions.len(),
                "Quote stream live"
            );
            self.receive_loop(socket.as_mut()).await
        } else {
            SessionOutcome::Cancelled
        };

        if matches!(outcome, SessionOutcome::Failed { .. }) {
            self.set_state(ConnectionState::Reconnecting);
        }
        socket.close(CloseReason::GoingAway).await;
        tracing::debug!("Socket closed");

        outcome
    }

    async fn send_subscriptions(&self, socket: &mut dyn StreamSocket) {
        let frames = match self.subscriptions.subscribe_frames() {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode subscribe requests");
                return;
            }
        };

        for (instrument, payload) in frames {
            match socket.send_text(payload).await {
                Ok(()) => tracing::debug!(%instrument, "Subscribe request sent"),
                Err(e) => {
                    Counters::add(&self.counters.subscribe_failures, 1);
                    metrics::record_subscribe_failure();
                    tracing::warn!(%instrument, error = %e, "Subscribe request failed");
                }
            }
        }
    }

    async fn receive_loop(&self, socket: &mut dyn StreamSocket) -> SessionOutcome {
        loop {
            let received = tokio::select! {
                () = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                frame = self.next_frame(socket) => frame,
            };

            match received {
                Ok(frame) => self.handle_frame(&frame),
                Err(error) => {
                    return SessionOutcome::Failed {
                        error,
                        streamed: true,
                    };
                }
            }
        }
    }

    async fn next_frame(&self, socket: &mut dyn StreamSocket) -> Result<Frame, TransportError> {
        let Some(window) = self.settings.idle_timeout else {
            return socket.recv().await;
        };

        tokio::time::timeout(window, socket.recv())
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::Receive(format!(
                    "no frame received for {}s",
                    window.as_secs()
                )))
            })
    }

    fn handle_frame(&self, frame: &Frame) {
        if matches!(frame, Frame::Control) {
            tracing::trace!("Control frame");
            return;
        }

        let started = Instant::now();
        Counters::add(&self.counters.frames_received, 1);

        match self.codec.decode_frame(frame) {
            Ok(envelope) => {
                metrics::record_frame_received(envelope.kind());
                self.apply(envelope);
            }
            Err(e) => {
                Counters::add(&self.counters.parse_failures, 1);
                metrics::record_parse_failure();
                tracing::trace!(error = %e, "Dropping undecodable frame");
            }
        }

        metrics::record_processing_duration(started.elapsed());
    }

    fn apply(&self, envelope: InboundEnvelope) {
        match envelope {
            InboundEnvelope::Trade { trades } => {
                let applied = self.store.apply_trades(&trades);
                let ignored = trades.len() - applied;

                Counters::add(&self.counters.trades_applied, applied as u64);
                Counters::add(&self.counters.trades_ignored, ignored as u64);
                metrics::record_trades(applied as u64, ignored as u64);
                tracing::trace!(applied, ignored, "Trade frame applied");
            }
            InboundEnvelope::Error { message } => {
                tracing::warn!(message = %message, "Server reported error");
            }
            InboundEnvelope::Other => {
                tracing::trace!("Ignoring non-trade message");
            }
        }
    }

    /// Publish a new state. Repeating the current state wakes no one.
    fn set_state(&self, state: ConnectionState) {
        let mut previous = None;
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            previous = Some(std::mem::replace(current, state));
            true
        });

        if let Some(previous) = previous {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
            metrics::set_connection_state(state);
        }
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state().as_str())
            .field("instruments", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}
