#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::cast_possible_truncation,
        clippy::items_after_statements
    )
)]

//! Stock Stream - Per-Symbol Market Data Handles
//!
//! Attaches one handle per stock symbol to a broker's push feed and fans
//! each update out to one of four independent streams: level 1 quotes,
//! level 2 depth, trade prints and account updates.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Identities, stream kinds and subscription types
//!   - `identity`: `Symbol` and the transport's `FeedId`
//!   - `streaming`: stream kinds, transport tags, update notifications
//!   - `subscription`: tokens, load state, status snapshots
//!   - `error`: feed errors
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: symbol directory, feed transport, feed listener, metrics
//!   - `services`: resolver, feed subscription, streams, multiplexer,
//!     stock handle, stock book
//!
//! - **Infrastructure**: Adapters and process concerns
//!   - `transport`: in-memory transport and synthetic feed
//!   - `broadcast`: stream → tokio channel bridge
//!   - `retry`: backoff for loading handles
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//!                                       ┌──► level1 ──► subscribers
//! Transport ──► FeedListener ──► Mux ───┼──► level2 ──► subscribers
//!  (push)       (per handle)   (by tag) ├──► prints ──► subscribers
//!                                       └──► account ─► subscribers
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use stock_stream::{FeedContext, InMemoryTransport, LEVEL1_TAG, StockHandle, Symbol};
//!
//! let transport = Arc::new(InMemoryTransport::new());
//! let symbol = Symbol::parse("AAPL").unwrap();
//! let feed = transport.register_symbol(&symbol);
//!
//! let handle = StockHandle::new(symbol, &FeedContext::from_transport(&transport));
//! handle.level1().subscribe(|quote, _| println!("quote: {quote}"));
//! handle.load().unwrap();
//!
//! transport.publish(feed, LEVEL1_TAG, &json!({"bid": 100.1, "ask": 100.2}), None);
//! handle.clear();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::error::FeedError;
pub use domain::identity::{FeedId, Symbol, SymbolError};
pub use domain::streaming::{
    ACCOUNT_TAG, LEVEL1_TAG, LEVEL2_TAG, PRINTS_TAG, Payload, StreamKind, UpdateNotification,
};
pub use domain::subscription::{
    HandleStatus, LoadState, StreamStats, SubscriptionHandle, SubscriptionToken,
};

// Ports
pub use application::ports::{
    FeedContext, FeedListener, FeedTransport, MetricsPort, NoopMetrics, SymbolDirectory,
};

// Services
pub use application::services::multiplexer::{DispatchOutcome, StreamMultiplexer};
pub use application::services::registry::StockBook;
pub use application::services::stock_handle::StockHandle;
pub use application::services::stream::{Stream, UpdateCallback};

// Infrastructure config
pub use infrastructure::config::{AppConfig, ConfigError, FeedSettings, RetrySettings};

// Transport adapters
pub use infrastructure::broadcast::{StreamUpdate, subscribe_channel};
pub use infrastructure::transport::InMemoryTransport;
pub use infrastructure::transport::generator::SyntheticFeed;

// Retry
pub use infrastructure::retry::{RetryConfig, RetryError, RetryPolicy, load_with_retry};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
