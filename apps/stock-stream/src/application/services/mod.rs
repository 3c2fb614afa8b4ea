//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `SymbolResolver`: symbol → feed id lookup
//! - `FeedSubscription`: the single listener registration with the transport
//! - `Stream`: subscriber set and ordered delivery for one update kind
//! - `StreamMultiplexer`: tag-based routing of notifications to streams
//! - `StockHandle`: per-symbol aggregate with load/clear lifecycle
//! - `StockBook`: one handle per symbol across the process

pub mod feed_subscription;
pub mod multiplexer;
pub mod registry;
pub mod resolver;
pub mod stock_handle;
pub mod stream;
