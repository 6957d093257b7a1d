//! Configuration Module
//!
//! Configuration loading for the price stream client.

mod settings;

pub use settings::{
    ApiToken, ConfigError, DEFAULT_INSTRUMENTS, ServerSettings, StreamConfig, WebSocketSettings,
};
