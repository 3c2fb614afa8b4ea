//! Port Interfaces
//!
//! Defines the interfaces (ports) for the upstream broker feed following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `SymbolDirectory`: the transport's symbol → feed id registry
//! - `FeedTransport`: listener registration and load state
//! - `MetricsPort`: dispatch and lifecycle counters
//!
//! ## Driver Ports (Inbound)
//!
//! - `FeedListener`: push callback the transport invokes per update

use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::FeedError;
use crate::domain::identity::{FeedId, Symbol};
use crate::domain::streaming::{StreamKind, UpdateNotification};
use crate::domain::subscription::SubscriptionHandle;

/// Read access to the transport's symbol registry.
///
/// The transport is the only writer of this registry; the core only looks
/// symbols up.
#[cfg_attr(test, mockall::automock)]
pub trait SymbolDirectory: Send + Sync {
    /// Look up the feed id for a symbol, `None` if the transport has no
    /// mapping yet.
    fn feed_id(&self, symbol: &Symbol) -> Option<FeedId>;
}

/// Receiver of pushed updates.
///
/// Invoked from a delivery context the core does not control, possibly
/// concurrently for different notifications.
pub trait FeedListener: Send + Sync {
    /// Handle one update notification.
    fn on_notification(&self, notification: &UpdateNotification<'_>);
}

/// Upstream feed transport.
#[cfg_attr(test, mockall::automock)]
pub trait FeedTransport: Send + Sync {
    /// Register a listener for a feed.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::TransportUnavailable`] if connectivity is not
    /// ready.
    fn register_listener(
        &self,
        feed: FeedId,
        listener: Arc<dyn FeedListener>,
    ) -> Result<SubscriptionHandle, FeedError>;

    /// Remove a listener registration. Unknown handles are ignored.
    fn deregister_listener(&self, handle: SubscriptionHandle);

    /// Whether the transport considers the feed loaded (data flowing).
    fn is_feed_loaded(&self, feed: FeedId) -> bool;
}

/// Sink for dispatch and lifecycle measurements.
///
/// Every method defaults to doing nothing, so adapters only override what
/// they export.
pub trait MetricsPort: Send + Sync {
    /// One notification delivered on `kind`, taking `elapsed`.
    fn dispatched(&self, _kind: StreamKind, _elapsed: Duration) {}

    /// One notification dropped for an unrecognized tag.
    fn unrecognized(&self) {}

    /// One load attempt; `None` means it succeeded.
    fn load_attempted(&self, _error: Option<&FeedError>) {}

    /// One handle detached from its feed.
    fn cleared(&self) {}

    /// Handles currently attached to a feed.
    fn attached_handles(&self, _count: usize) {}
}

/// Metrics sink that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsPort for NoopMetrics {}

/// The collaborators a stock handle needs, passed explicitly rather than
/// looked up from global state.
#[derive(Clone)]
pub struct FeedContext {
    directory: Arc<dyn SymbolDirectory>,
    transport: Arc<dyn FeedTransport>,
    metrics: Arc<dyn MetricsPort>,
}

impl FeedContext {
    /// Create a context from separate directory and transport collaborators.
    #[must_use]
    pub fn new(directory: Arc<dyn SymbolDirectory>, transport: Arc<dyn FeedTransport>) -> Self {
        Self {
            directory,
            transport,
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replace the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPort>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Create a context from a transport that also owns the symbol registry.
    #[must_use]
    pub fn from_transport<T>(transport: &Arc<T>) -> Self
    where
        T: SymbolDirectory + FeedTransport + 'static,
    {
        let directory: Arc<dyn SymbolDirectory> = Arc::clone(transport) as _;
        let feed: Arc<dyn FeedTransport> = Arc::clone(transport) as _;
        Self::new(directory, feed)
    }

    /// The symbol registry.
    #[must_use]
    pub fn directory(&self) -> &Arc<dyn SymbolDirectory> {
        &self.directory
    }

    /// The feed transport.
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn FeedTransport> {
        &self.transport
    }

    /// The metrics sink.
    #[must_use]
    pub fn metrics(&self) -> &Arc<dyn MetricsPort> {
        &self.metrics
    }
}

impl std::fmt::Debug for FeedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedContext").finish_non_exhaustive()
    }
}
