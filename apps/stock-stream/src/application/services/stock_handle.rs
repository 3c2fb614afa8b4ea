//! Stock Handle
//!
//! The user-facing aggregate for one instrument: its symbol, its feed
//! subscription and its four update streams (level 1, level 2, prints,
//! account).
//!
//! # Lifecycle
//!
//! ```text
//! Unloaded ──load() ok──► Loaded ──clear()──► Unloaded
//!    │                                           ▲
//!    └──────────── load() error ─────────────────┘
//! ```
//!
//! Streams exist for the handle's whole lifetime, so callers may subscribe
//! before loading. Dropping a handle clears it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::feed_subscription::FeedSubscription;
use super::multiplexer::StreamMultiplexer;
use super::resolver::SymbolResolver;
use super::stream::Stream;
use crate::application::ports::{FeedContext, FeedListener, MetricsPort};
use crate::domain::error::FeedError;
use crate::domain::identity::{FeedId, Symbol};
use crate::domain::streaming::StreamKind;
use crate::domain::subscription::{HandleStatus, LoadState};

/// Per-symbol market data handle.
pub struct StockHandle {
    symbol: Symbol,
    resolver: SymbolResolver,
    subscription: FeedSubscription,
    multiplexer: Arc<StreamMultiplexer>,
    metrics: Arc<dyn MetricsPort>,
    /// Serializes `load`/`clear`. `clear` takes it only after the gate closes.
    lifecycle: Mutex<()>,
    attached_since: Mutex<Option<DateTime<Utc>>>,
}

impl StockHandle {
    /// Create an unloaded handle.
    #[must_use]
    pub fn new(symbol: Symbol, context: &FeedContext) -> Self {
        Self {
            resolver: SymbolResolver::new(Arc::clone(context.directory())),
            subscription: FeedSubscription::new(Arc::clone(context.transport())),
            multiplexer: Arc::new(
                StreamMultiplexer::new(symbol.clone())
                    .with_metrics(Arc::clone(context.metrics())),
            ),
            metrics: Arc::clone(context.metrics()),
            lifecycle: Mutex::new(()),
            attached_since: Mutex::new(None),
            symbol,
        }
    }

    /// Create a handle and, if `auto_load` is set, load it immediately.
    ///
    /// # Errors
    ///
    /// Returns the [`Self::load`] error when auto-loading fails.
    pub fn with_auto_load(
        symbol: Symbol,
        context: &FeedContext,
        auto_load: bool,
    ) -> Result<Self, FeedError> {
        let handle = Self::new(symbol, context);
        if auto_load {
            handle.load()?;
        }
        Ok(handle)
    }

    /// Resolve the feed and attach to it.
    ///
    /// A no-op if already loaded. On failure the handle stays unloaded with
    /// no registration left behind.
    ///
    /// # Errors
    ///
    /// - [`FeedError::UnknownSymbol`] if the transport has no feed id for
    ///   the symbol.
    /// - [`FeedError::TransportUnavailable`] if the transport is not ready.
    #[tracing::instrument(skip(self), fields(symbol = %self.symbol))]
    pub fn load(&self) -> Result<(), FeedError> {
        let _lifecycle = self.lifecycle.lock();

        if self.subscription.is_attached() {
            tracing::debug!("Handle already loaded");
            return Ok(());
        }

        let result = self.attach();
        match &result {
            Ok(feed_id) => {
                *self.attached_since.lock() = Some(Utc::now());
                self.metrics.load_attempted(None);
                tracing::info!(feed_id = %feed_id, "Handle loaded");
            }
            Err(e) => {
                self.metrics.load_attempted(Some(e));
                tracing::warn!(error = %e, "Handle load failed");
            }
        }
        result.map(|_| ())
    }

    fn attach(&self) -> Result<FeedId, FeedError> {
        let feed_id = self.resolver.resolve(&self.symbol)?;

        // Open before registering so the first pushed update is not lost.
        self.multiplexer.open();
        let listener: Arc<dyn FeedListener> = Arc::clone(&self.multiplexer) as _;
        if let Err(e) = self.subscription.attach(feed_id, listener) {
            self.multiplexer.close();
            return Err(e);
        }
        Ok(feed_id)
    }

    /// Detach from the feed and stop all streams.
    ///
    /// Waits for any in-flight dispatch to finish; no callback fires after
    /// this returns. A no-op if already unloaded.
    ///
    /// Must not be called from a subscriber callback of this handle. Other
    /// handle methods, `load` included, are safe from callbacks.
    #[tracing::instrument(skip(self), fields(symbol = %self.symbol))]
    pub fn clear(&self) {
        // Close first: a callback still running may call back into the handle.
        self.multiplexer.close();

        let _lifecycle = self.lifecycle.lock();
        if self.subscription.detach() {
            self.metrics.cleared();
            tracing::info!("Handle cleared");
        } else {
            tracing::debug!("Handle already cleared");
        }
        *self.attached_since.lock() = None;
    }

    /// Whether the feed is attached and the transport reports data flowing.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.subscription.is_active()
    }

    /// Detailed lifecycle state.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        if !self.subscription.is_attached() {
            LoadState::Unloaded
        } else if self.subscription.is_active() {
            LoadState::Loaded
        } else {
            LoadState::Pending
        }
    }

    /// The instrument symbol.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The feed id while attached.
    #[must_use]
    pub fn feed_id(&self) -> Option<FeedId> {
        self.subscription.feed_id()
    }

    /// The stream for a kind. Valid in every load state.
    #[must_use]
    pub fn stream(&self, kind: StreamKind) -> &Stream {
        self.multiplexer.stream(kind)
    }

    /// Level 1 (top-of-book) stream.
    #[must_use]
    pub fn level1(&self) -> &Stream {
        self.stream(StreamKind::Level1)
    }

    /// Level 2 (depth-of-book) stream.
    #[must_use]
    pub fn level2(&self) -> &Stream {
        self.stream(StreamKind::Level2)
    }

    /// Trade prints stream.
    #[must_use]
    pub fn prints(&self) -> &Stream {
        self.stream(StreamKind::Prints)
    }

    /// Account update stream.
    #[must_use]
    pub fn account(&self) -> &Stream {
        self.stream(StreamKind::Account)
    }

    /// Notifications dropped because their tag was not recognized.
    #[must_use]
    pub fn unrecognized(&self) -> u64 {
        self.multiplexer.unrecognized()
    }

    /// Point-in-time status snapshot.
    #[must_use]
    pub fn status(&self) -> HandleStatus {
        HandleStatus {
            symbol: self.symbol.clone(),
            feed_id: self.feed_id(),
            state: self.load_state(),
            attached_since: *self.attached_since.lock(),
            streams: self.multiplexer.streams().iter().map(Stream::stats).collect(),
            unrecognized: self.unrecognized(),
        }
    }
}

impl Drop for StockHandle {
    fn drop(&mut self) {
        self.clear();
    }
}

impl std::fmt::Debug for StockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockHandle")
            .field("symbol", &self.symbol)
            .field("state", &self.load_state())
            .field("feed_id", &self.feed_id())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;
    use crate::application::ports::{MockFeedTransport, MockSymbolDirectory};
    use crate::domain::streaming::UpdateNotification;
    use crate::domain::subscription::SubscriptionHandle;

    type Captured = Arc<Mutex<Option<Arc<dyn FeedListener>>>>;

    fn directory_with(feed: Option<FeedId>) -> MockSymbolDirectory {
        let mut directory = MockSymbolDirectory::new();
        directory.expect_feed_id().returning(move |_| feed);
        directory
    }

    /// Transport mock that accepts one registration and keeps the listener.
    fn capturing_transport(captured: &Captured, loaded: bool) -> MockFeedTransport {
        let mut transport = MockFeedTransport::new();
        let slot = Arc::clone(captured);
        transport
            .expect_register_listener()
            .times(1)
            .returning(move |_, listener| {
                *slot.lock() = Some(listener);
                Ok(SubscriptionHandle::new(1))
            });
        let slot = Arc::clone(captured);
        transport
            .expect_deregister_listener()
            .returning(move |_| {
                slot.lock().take();
            });
        transport.expect_is_feed_loaded().return_const(loaded);
        transport
    }

    fn context(directory: MockSymbolDirectory, transport: MockFeedTransport) -> FeedContext {
        FeedContext::new(Arc::new(directory), Arc::new(transport))
    }

    fn aapl() -> Symbol {
        Symbol::parse("AAPL").unwrap()
    }

    #[test]
    fn new_handle_is_unloaded() {
        let ctx = context(MockSymbolDirectory::new(), MockFeedTransport::new());
        let handle = StockHandle::new(aapl(), &ctx);

        assert!(!handle.is_loaded());
        assert_eq!(handle.load_state(), LoadState::Unloaded);
        assert_eq!(handle.feed_id(), None);
        assert_eq!(handle.symbol().as_str(), "AAPL");
    }

    #[test]
    fn load_unknown_symbol_stays_unloaded() {
        let ctx = context(directory_with(None), MockFeedTransport::new());
        let handle = StockHandle::new(aapl(), &ctx);

        assert_eq!(handle.load(), Err(FeedError::UnknownSymbol(aapl())));
        assert_eq!(handle.load_state(), LoadState::Unloaded);
    }

    #[test]
    fn load_transport_unavailable_stays_unloaded() {
        let mut transport = MockFeedTransport::new();
        transport
            .expect_register_listener()
            .returning(|_, _| Err(FeedError::TransportUnavailable("offline".to_string())));
        let ctx = context(directory_with(Some(FeedId::new(4))), transport);
        let handle = StockHandle::new(aapl(), &ctx);

        let result = handle.load();

        assert!(matches!(result, Err(FeedError::TransportUnavailable(_))));
        assert!(!handle.is_loaded());
        assert_eq!(handle.load_state(), LoadState::Unloaded);
        assert!(!handle.multiplexer.is_open());
    }

    #[test]
    fn auto_load_propagates_failure() {
        let ctx = context(directory_with(None), MockFeedTransport::new());
        let result = StockHandle::with_auto_load(aapl(), &ctx, true);
        assert!(matches!(result, Err(FeedError::UnknownSymbol(_))));
    }

    #[test]
    fn auto_load_disabled_does_not_touch_transport() {
        let ctx = context(MockSymbolDirectory::new(), MockFeedTransport::new());
        let handle = StockHandle::with_auto_load(aapl(), &ctx, false).unwrap();
        assert_eq!(handle.load_state(), LoadState::Unloaded);
    }

    #[test]
    fn load_twice_registers_once() {
        let captured: Captured = Arc::default();
        let ctx = context(
            directory_with(Some(FeedId::new(4))),
            capturing_transport(&captured, true),
        );
        let handle = StockHandle::new(aapl(), &ctx);

        handle.load().unwrap();
        handle.load().unwrap();

        assert!(handle.is_loaded());
        assert_eq!(handle.feed_id(), Some(FeedId::new(4)));
        assert!(handle.status().attached_since.is_some());
    }

    #[test]
    fn pending_until_transport_loaded() {
        let captured: Captured = Arc::default();
        let ctx = context(
            directory_with(Some(FeedId::new(4))),
            capturing_transport(&captured, false),
        );
        let handle = StockHandle::new(aapl(), &ctx);

        handle.load().unwrap();

        assert!(!handle.is_loaded());
        assert_eq!(handle.load_state(), LoadState::Pending);
    }

    #[test]
    fn delivered_through_registered_listener() {
        let captured: Captured = Arc::default();
        let ctx = context(
            directory_with(Some(FeedId::new(4))),
            capturing_transport(&captured, true),
        );
        let handle = StockHandle::new(aapl(), &ctx);
        let (tx, rx) = mpsc::channel();
        handle
            .level1()
            .subscribe(move |payload, _| tx.send(payload.clone()).unwrap());

        handle.load().unwrap();

        let listener = captured.lock().clone().unwrap();
        let quote = json!({"bid": 100.1, "ask": 100.2});
        listener.on_notification(&UpdateNotification::for_kind(StreamKind::Level1, &quote));

        assert_eq!(rx.try_recv().unwrap(), quote);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clear_silences_stale_listener() {
        let captured: Captured = Arc::default();
        let ctx = context(
            directory_with(Some(FeedId::new(4))),
            capturing_transport(&captured, true),
        );
        let handle = StockHandle::new(aapl(), &ctx);
        let (tx, rx) = mpsc::channel();
        handle
            .prints()
            .subscribe(move |payload, _| tx.send(payload.clone()).unwrap());

        handle.load().unwrap();
        let stale = captured.lock().clone().unwrap();

        handle.clear();
        handle.clear();

        stale.on_notification(&UpdateNotification::for_kind(StreamKind::Prints, &json!(1)));
        assert!(rx.try_recv().is_err());
        assert!(!handle.is_loaded());
        assert_eq!(handle.load_state(), LoadState::Unloaded);
        assert!(handle.status().attached_since.is_none());
    }

    #[derive(Default)]
    struct LifecycleCounts {
        loads: Mutex<Vec<Option<&'static str>>>,
        clears: Mutex<usize>,
    }

    impl MetricsPort for LifecycleCounts {
        fn load_attempted(&self, error: Option<&FeedError>) {
            self.loads.lock().push(error.map(FeedError::kind));
        }

        fn cleared(&self) {
            *self.clears.lock() += 1;
        }
    }

    #[test]
    fn lifecycle_reported_to_metrics_port() {
        let captured: Captured = Arc::default();
        let counts = Arc::new(LifecycleCounts::default());
        let ctx = context(
            directory_with(Some(FeedId::new(4))),
            capturing_transport(&captured, true),
        )
        .with_metrics(Arc::clone(&counts) as Arc<dyn MetricsPort>);
        let handle = StockHandle::new(aapl(), &ctx);

        handle.load().unwrap();
        handle.load().unwrap();
        handle.clear();
        handle.clear();

        assert_eq!(*counts.loads.lock(), vec![None]);
        assert_eq!(*counts.clears.lock(), 1);
    }

    #[test]
    fn failed_load_reported_with_kind() {
        let counts = Arc::new(LifecycleCounts::default());
        let ctx = context(directory_with(None), MockFeedTransport::new())
            .with_metrics(Arc::clone(&counts) as Arc<dyn MetricsPort>);
        let handle = StockHandle::new(aapl(), &ctx);

        assert!(handle.load().is_err());
        assert_eq!(*counts.loads.lock(), vec![Some("unknown_symbol")]);
    }

    #[test]
    fn status_reports_streams() {
        let ctx = context(MockSymbolDirectory::new(), MockFeedTransport::new());
        let handle = StockHandle::new(aapl(), &ctx);
        handle.level2().subscribe(|_, _| {});
        handle.level2().subscribe(|_, _| {});
        handle.account().subscribe(|_, _| {});

        let status = handle.status();

        assert_eq!(status.state, LoadState::Unloaded);
        assert_eq!(status.streams.len(), 4);
        assert_eq!(status.streams[StreamKind::Level2.index()].subscribers, 2);
        assert_eq!(status.streams[StreamKind::Account.index()].subscribers, 1);
        assert_eq!(status.total_subscribers(), 3);
    }
}
