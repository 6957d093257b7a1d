//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for the streaming transport.
pub mod ports;

/// Presentation-facing client facade.
pub mod services;
