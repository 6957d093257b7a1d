//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, connection status, the current price
//! snapshot and Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (ready only while streaming)
//! - `GET /prices` - Current price snapshot as JSON
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::PriceStreamClient;
use crate::domain::streaming::{ConnectionState, PriceQuote};
use crate::infrastructure::finnhub::ConnectionStats;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Client version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Connection lifecycle state.
    pub state: ConnectionState,
    /// Connection counters.
    pub stats: ConnectionStats,
    /// Number of tracked instruments.
    pub instruments: usize,
    /// Instruments that have received at least one trade.
    pub priced: usize,
    /// Time of the last applied trade.
    pub last_update: Option<DateTime<Utc>>,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Streaming.
    Healthy,
    /// Connecting, subscribing or reconnecting.
    Degraded,
    /// Disconnected.
    Unhealthy,
}

impl From<ConnectionState> for HealthStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Streaming => Self::Healthy,
            ConnectionState::Connecting
            | ConnectionState::Subscribing
            | ConnectionState::Reconnecting => Self::Degraded,
            ConnectionState::Disconnected => Self::Unhealthy,
        }
    }
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    client: Arc<PriceStreamClient>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, client: Arc<PriceStreamClient>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            client,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Build the health router.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/prices", get(prices_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.client.state() == ConnectionState::Streaming {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn prices_handler(State(state): State<Arc<HealthServerState>>) -> Json<Vec<PriceQuote>> {
    Json(state.client.snapshot())
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let connection_state = state.client.state();
    let store = state.client.store();

    HealthResponse {
        status: connection_state.into(),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        state: connection_state,
        stats: state.client.stats(),
        instruments: store.len(),
        priced: store.priced_count(),
        last_update: store.last_update(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::StreamConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<HealthServerState> {
        let mut config = StreamConfig::new("token");
        config.instruments = vec!["A".to_string(), "B".to_string()];
        let client = Arc::new(PriceStreamClient::new(&config).unwrap());
        Arc::new(HealthServerState::new("0.0.0-test".to_string(), client))
    }

    async fn fetch(state: Arc<HealthServerState>, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn health_status_from_state() {
        assert_eq!(
            HealthStatus::from(ConnectionState::Streaming),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthStatus::from(ConnectionState::Reconnecting),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::from(ConnectionState::Disconnected),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        assert_eq!(fetch(test_state(), "/healthz").await, (StatusCode::OK, "OK".to_string()));
    }

    #[tokio::test]
    async fn not_ready_until_streaming() {
        let (status, body) = fetch(test_state(), "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "NOT READY");
    }

    #[tokio::test]
    async fn health_reports_disconnected_client() {
        let (status, body) = fetch(test_state(), "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["instruments"], 2);
        assert_eq!(json["priced"], 0);
        assert!(json["last_update"].is_null());
    }

    #[tokio::test]
    async fn zero_price_tick_counts_as_priced() {
        let state = test_state();
        state.client.store().apply_trade(&PriceQuote::new("A", 0.0));

        let (_, body) = fetch(state, "/health").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(json["priced"], 1);
        assert!(json["last_update"].is_string());
    }

    #[tokio::test]
    async fn prices_returns_snapshot_in_order() {
        let state = test_state();
        state
            .client
            .store()
            .apply_trade(&PriceQuote::new("B", 1.25));

        let (status, body) = fetch(state, "/prices").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json[0]["instrument"], "A");
        assert_eq!(json[0]["price"], 0.0);
        assert_eq!(json[1]["instrument"], "B");
        assert_eq!(json[1]["price"], 1.25);
    }
}
