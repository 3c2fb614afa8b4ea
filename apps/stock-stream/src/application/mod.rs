//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the upstream feed.

/// Port interfaces for the upstream transport and symbol registry.
pub mod ports;

/// Resolver, subscription, streams, multiplexer and stock handle services.
pub mod services;
