//! Application Services
//!
//! - `PriceStreamClient`: Wires the subscription manager, price store and
//!   stream connection together and exposes the read side to consumers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::application::ports::StreamTransport;
use crate::domain::prices::{PriceStore, StoreError};
use crate::domain::streaming::{ConnectionState, PriceQuote};
use crate::domain::subscription::{SubscriptionError, SubscriptionManager};
use crate::infrastructure::config::{ConfigError, StreamConfig};
use crate::infrastructure::finnhub::{
    ConnectionSettings, ConnectionStats, StreamConnection, StreamError, WsTransport,
};

/// Errors building or starting the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Instrument list is invalid.
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    /// Price store could not be initialized.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Connection lifecycle error.
    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// Live price client for a fixed instrument set.
pub struct PriceStreamClient {
    subscriptions: Arc<SubscriptionManager>,
    store: Arc<PriceStore>,
    connection: Arc<StreamConnection>,
    task: Mutex<Option<JoinHandle<Result<(), StreamError>>>>,
}

impl PriceStreamClient {
    /// Build a client using the tokio-tungstenite transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or instrument list is invalid.
    pub fn new(config: &StreamConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(WsTransport::new(config.websocket.connect_timeout));
        Self::with_transport(config, transport)
    }

    /// Build a client over an arbitrary transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or instrument list is invalid.
    pub fn with_transport(
        config: &StreamConfig,
        transport: Arc<dyn StreamTransport>,
    ) -> Result<Self, ClientError> {
        let endpoint = config.endpoint()?;
        let subscriptions = Arc::new(SubscriptionManager::new(config.instruments.iter().cloned())?);
        let store = Arc::new(PriceStore::initialize(
            subscriptions.instruments().iter().cloned(),
        )?);

        let connection = Arc::new(StreamConnection::new(
            endpoint,
            transport,
            Arc::clone(&subscriptions),
            Arc::clone(&store),
            ConnectionSettings::from_websocket_settings(&config.websocket),
        ));

        Ok(Self {
            subscriptions,
            store,
            connection,
            task: Mutex::new(None),
        })
    }

    /// Start streaming in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the client was already started or stopped.
    pub fn start(&self) -> Result<(), ClientError> {
        let handle = self.connection.connect()?;
        *self.task.lock() = Some(handle);

        tracing::info!(
            endpoint = %self.connection.endpoint(),
            instruments = self.subscriptions.len(),
            "Price stream started"
        );
        Ok(())
    }

    /// Disconnect and wait for the lifecycle task to finish.
    ///
    /// Returns the task's result, or `Ok(())` if the client was never started
    /// or has already been stopped.
    ///
    /// # Errors
    ///
    /// Returns the error the lifecycle task ended with.
    pub async fn stop(&self) -> Result<(), ClientError> {
        self.connection.disconnect();

        let handle = self.task.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result.map_err(ClientError::from),
            Err(e) => {
                tracing::error!(error = %e, "Stream task panicked");
                Ok(())
            }
        }
    }

    /// Resolves once streaming has ended on its own or after [`stop`].
    ///
    /// Without a reconnect attempt limit this only happens after `stop`.
    ///
    /// [`stop`]: Self::stop
    pub async fn finished(&self) {
        self.connection.finished().await;
    }

    /// Prices in subscription order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PriceQuote> {
        self.store.snapshot()
    }

    /// Change notifications for the price store.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.store.changes()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connection state notifications.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_changes()
    }

    /// Connection counters.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.connection.stats()
    }

    /// Shared price store.
    #[must_use]
    pub fn store(&self) -> Arc<PriceStore> {
        Arc::clone(&self.store)
    }

    /// Subscribed instruments.
    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }
}
