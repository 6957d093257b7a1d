//! Domain Layer - Core streaming types and state.
//!
//! This layer contains the core domain types for price streaming
//! with no I/O. The price store and subscription set are owned here;
//! the connection that feeds them lives in the infrastructure layer.

/// Price streaming types (instruments, quotes, envelopes, connection state).
pub mod streaming;

/// Tracked instrument set and subscribe frames.
pub mod subscription;

/// Latest price per instrument with change notification.
pub mod prices;
