//! Domain Layer - Core identity, streaming and subscription types.
//!
//! This layer contains the core domain types for per-symbol market data
//! handles with no runtime dependencies. All types here are pure Rust with
//! serialization support.

/// Feed error taxonomy shared by every layer.
pub mod error;

/// Symbol and feed identifier types.
pub mod identity;

/// Stream kinds and update notifications.
pub mod streaming;

/// Subscription tokens, load state and handle status snapshots.
pub mod subscription;
