//! Prometheus Metrics Module
//!
//! Exposes stream client metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames received by envelope kind, parse failures
//! - **Trades**: Quotes applied to the store or ignored as untracked
//! - **Connection**: Lifecycle state, transport errors, reconnects
//! - **Latency**: Per-frame processing time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;

use crate::application::ports::TransportError;
use crate::domain::streaming::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let _guard = INSTALL_LOCK.lock();
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_stream_frames_received_total",
        "Data frames received from the quote stream by envelope kind"
    );
    describe_counter!(
        "price_stream_parse_failures_total",
        "Frames dropped because they could not be decoded"
    );
    describe_counter!(
        "price_stream_trades_applied_total",
        "Quotes written to the price store"
    );
    describe_counter!(
        "price_stream_trades_ignored_total",
        "Quotes for instruments outside the tracked set"
    );
    describe_counter!(
        "price_stream_subscribe_failures_total",
        "Subscribe frames that failed to send"
    );
    describe_counter!(
        "price_stream_transport_errors_total",
        "Transport failures by kind"
    );
    describe_counter!(
        "price_stream_reconnects_total",
        "Reconnection attempts scheduled"
    );
    describe_gauge!(
        "price_stream_connection_state",
        "Lifecycle state (0=disconnected 1=connecting 2=subscribing 3=streaming 4=reconnecting)"
    );
    describe_histogram!(
        "price_stream_frame_processing_seconds",
        "Time to decode and apply one frame"
    );

    // exported from the start, before the first transition
    set_connection_state(ConnectionState::Disconnected);
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a decoded data frame.
pub fn record_frame_received(kind: &'static str) {
    counter!("price_stream_frames_received_total", "kind" => kind).increment(1);
}

/// Record a frame that failed to decode.
pub fn record_parse_failure() {
    counter!("price_stream_parse_failures_total").increment(1);
}

/// Record the outcome of applying one trade frame.
pub fn record_trades(applied: u64, ignored: u64) {
    counter!("price_stream_trades_applied_total").increment(applied);
    counter!("price_stream_trades_ignored_total").increment(ignored);
}

/// Record a subscribe frame that failed to send.
pub fn record_subscribe_failure() {
    counter!("price_stream_subscribe_failures_total").increment(1);
}

/// Record a transport failure.
pub fn record_transport_error(error: &TransportError) {
    counter!("price_stream_transport_errors_total", "error_type" => error.kind()).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("price_stream_reconnects_total").increment(1);
}

/// Update the lifecycle state gauge.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("price_stream_connection_state").set(f64::from(state.code()));
}

/// Record frame processing duration.
pub fn record_processing_duration(duration: Duration) {
    histogram!("price_stream_frame_processing_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
