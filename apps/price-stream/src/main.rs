//! Price Stream Binary
//!
//! Streams live prices and prints a table whenever they change.
//!
//! # Usage
//!
//! ```bash
//! FINNHUB_TOKEN=... cargo run --bin price-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `FINNHUB_TOKEN`: Finnhub access token
//!
//! ## Optional
//! - `FINNHUB_WS_URL`: Stream endpoint (default: wss://ws.finnhub.io)
//! - `PRICE_STREAM_SYMBOLS`: Comma separated instruments
//! - `PRICE_STREAM_RECONNECT_DELAY_SECS`: Reconnect delay (default: 5)
//! - `PRICE_STREAM_RECONNECT_DELAY_MAX_SECS`: Reconnect delay ceiling (default: 5)
//! - `PRICE_STREAM_RECONNECT_MULTIPLIER`: Reconnect delay growth (default: 1.0)
//! - `PRICE_STREAM_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `PRICE_STREAM_IDLE_TIMEOUT_SECS`: 0 = disabled (default: 0)
//! - `PRICE_STREAM_CONNECT_TIMEOUT_SECS`: Handshake timeout (default: 10)
//! - `PRICE_STREAM_HEALTH_PORT`: Health check HTTP port, 0 = disabled (default: 8083)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: price_stream=info)

use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use price_stream::infrastructure::health::{HealthServer, HealthServerState};
use price_stream::infrastructure::telemetry;
use price_stream::{PriceQuote, PriceStreamClient, StreamConfig, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting price stream");

    let _metrics_handle = init_metrics()?;

    let config = StreamConfig::from_env()?;
    log_config(&config);

    let client = Arc::new(PriceStreamClient::new(&config).context("invalid stream configuration")?);
    let shutdown_token = CancellationToken::new();

    if config.server.health_port != 0 {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&client),
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );

        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    let render_task = tokio::spawn(render_on_change(
        Arc::clone(&client),
        shutdown_token.clone(),
    ));

    client.start()?;

    tokio::select! {
        () = await_shutdown() => {}
        () = client.finished() => {
            tracing::warn!("Price stream ended without a shutdown request");
        }
    }

    shutdown_token.cancel();
    let result = client.stop().await;
    let _ = render_task.await;

    tracing::info!("Price stream stopped");
    result.map_err(Into::into)
}

/// Print the table once, then again on every store change.
async fn render_on_change(client: Arc<PriceStreamClient>, shutdown_token: CancellationToken) {
    let mut changes = client.changes();
    print_table(&client.snapshot());

    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                print_table(&client.snapshot());
            }
        }
    }
}

fn print_table(quotes: &[PriceQuote]) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = stdout
        .write_all(render_table(quotes).as_bytes())
        .and_then(|()| stdout.flush())
    {
        tracing::debug!(error = %e, "Failed to write price table");
    }
}

/// Two columns: instrument and price with four decimals.
fn render_table(quotes: &[PriceQuote]) -> String {
    let width = quotes
        .iter()
        .map(|q| q.instrument.as_str().len())
        .max()
        .unwrap_or(0)
        .max("INSTRUMENT".len());

    let mut table = String::new();
    let _ = writeln!(table, "{:<width$}  {:>14}", "INSTRUMENT", "PRICE");
    for quote in quotes {
        let _ = writeln!(
            table,
            "{:<width$}  {:>14.4}",
            quote.instrument.as_str(),
            quote.price
        );
    }
    table.push('\n');
    table
}

/// Log the parsed configuration.
fn log_config(config: &StreamConfig) {
    tracing::info!(
        instruments = config.instruments.len(),
        health_port = config.server.health_port,
        reconnect_delay_secs = config.websocket.reconnect_delay.as_secs(),
        max_reconnect_attempts = config.websocket.max_reconnect_attempts,
        "Configuration loaded"
    );
    tracing::debug!(endpoint = %config.endpoint, symbols = ?config.instruments, "Stream target");
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
