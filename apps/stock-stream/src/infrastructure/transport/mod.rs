//! In-Memory Feed Transport
//!
//! A process-local transport implementing both upstream ports. It owns the
//! symbol registry (the only writer), tracks per-feed load state and pushes
//! notifications to registered listeners synchronously on the caller's
//! thread.
//!
//! Used by the demo binary behind [`generator::SyntheticFeed`] and by tests
//! as a scriptable upstream.

pub mod generator;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::application::ports::{FeedListener, FeedTransport, SymbolDirectory};
use crate::domain::error::FeedError;
use crate::domain::identity::{FeedId, Symbol};
use crate::domain::streaming::{Payload, UpdateNotification};
use crate::domain::subscription::SubscriptionHandle;

struct Registration {
    feed: FeedId,
    listener: Arc<dyn FeedListener>,
}

#[derive(Default)]
struct Registry {
    symbols: HashMap<Symbol, FeedId>,
    loaded: HashSet<FeedId>,
    listeners: HashMap<SubscriptionHandle, Registration>,
}

/// Scriptable in-process transport.
pub struct InMemoryTransport {
    registry: RwLock<Registry>,
    available: AtomicBool,
    load_on_attach: AtomicBool,
    next_handle: AtomicU64,
}

impl InMemoryTransport {
    /// Create an available transport with no symbols.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            available: AtomicBool::new(true),
            load_on_attach: AtomicBool::new(false),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Assign a feed id to `symbol`, or return the one it already has.
    ///
    /// Ids are sequential from 1 in registration order.
    pub fn register_symbol(&self, symbol: &Symbol) -> FeedId {
        let mut registry = self.registry.write();
        if let Some(feed) = registry.symbols.get(symbol) {
            return *feed;
        }
        let next = u32::try_from(registry.symbols.len()).map_or(u32::MAX, |n| n + 1);
        let feed = FeedId::new(next);
        registry.symbols.insert(symbol.clone(), feed);
        drop(registry);

        tracing::debug!(symbol = %symbol, feed_id = %feed, "Symbol registered");
        feed
    }

    /// Toggle connectivity. While unavailable, registrations fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether registrations currently succeed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Mark a feed loaded as soon as a listener attaches to it.
    pub fn set_load_on_attach(&self, enabled: bool) {
        self.load_on_attach.store(enabled, Ordering::Release);
    }

    /// Report the feed as loaded (initial snapshot arrived).
    pub fn mark_loaded(&self, feed: FeedId) {
        self.registry.write().loaded.insert(feed);
    }

    /// Report the feed as no longer loaded.
    pub fn mark_unloaded(&self, feed: FeedId) {
        self.registry.write().loaded.remove(&feed);
    }

    /// Push one notification to every listener registered for `feed`.
    ///
    /// Listeners are invoked outside the registry lock, so they may register
    /// or deregister. Returns the number of listeners invoked.
    pub fn publish(
        &self,
        feed: FeedId,
        tag: u16,
        payload: &Payload,
        supplementary: Option<&Payload>,
    ) -> usize {
        let listeners: Vec<Arc<dyn FeedListener>> = self
            .registry
            .read()
            .listeners
            .values()
            .filter(|r| r.feed == feed)
            .map(|r| Arc::clone(&r.listener))
            .collect();

        let mut notification = UpdateNotification::new(tag, payload);
        if let Some(extra) = supplementary {
            notification = notification.with_supplementary(extra);
        }
        for listener in &listeners {
            listener.on_notification(&notification);
        }
        listeners.len()
    }

    /// [`Self::publish`] addressed by symbol. Returns 0 for unknown symbols.
    pub fn publish_symbol(
        &self,
        symbol: &Symbol,
        tag: u16,
        payload: &Payload,
        supplementary: Option<&Payload>,
    ) -> usize {
        self.feed_id(symbol)
            .map_or(0, |feed| self.publish(feed, tag, payload, supplementary))
    }

    /// Listener registrations for `feed`.
    #[must_use]
    pub fn listener_count(&self, feed: FeedId) -> usize {
        self.registry
            .read()
            .listeners
            .values()
            .filter(|r| r.feed == feed)
            .count()
    }

    /// Every registered symbol with its feed id, sorted by id.
    #[must_use]
    pub fn symbols(&self) -> Vec<(Symbol, FeedId)> {
        let mut symbols: Vec<_> = self
            .registry
            .read()
            .symbols
            .iter()
            .map(|(s, f)| (s.clone(), *f))
            .collect();
        symbols.sort_by_key(|(_, feed)| *feed);
        symbols
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolDirectory for InMemoryTransport {
    fn feed_id(&self, symbol: &Symbol) -> Option<FeedId> {
        self.registry.read().symbols.get(symbol).copied()
    }
}

impl FeedTransport for InMemoryTransport {
    fn register_listener(
        &self,
        feed: FeedId,
        listener: Arc<dyn FeedListener>,
    ) -> Result<SubscriptionHandle, FeedError> {
        if !self.is_available() {
            return Err(FeedError::TransportUnavailable(
                "transport not connected".to_string(),
            ));
        }

        let handle = SubscriptionHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let mut registry = self.registry.write();
        registry
            .listeners
            .insert(handle, Registration { feed, listener });
        if self.load_on_attach.load(Ordering::Acquire) {
            registry.loaded.insert(feed);
        }
        drop(registry);

        tracing::debug!(feed_id = %feed, handle = handle.get(), "Listener registered");
        Ok(handle)
    }

    fn deregister_listener(&self, handle: SubscriptionHandle) {
        if self.registry.write().listeners.remove(&handle).is_some() {
            tracing::debug!(handle = handle.get(), "Listener deregistered");
        }
    }

    fn is_feed_loaded(&self, feed: FeedId) -> bool {
        self.registry.read().loaded.contains(&feed)
    }
}

impl std::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("InMemoryTransport")
            .field("available", &self.is_available())
            .field("symbols", &registry.symbols.len())
            .field("listeners", &registry.listeners.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::domain::streaming::LEVEL1_TAG;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(u16, Payload, Option<Payload>)>>,
    }

    impl FeedListener for Recorder {
        fn on_notification(&self, n: &UpdateNotification<'_>) {
            self.seen
                .lock()
                .push((n.tag, n.payload.clone(), n.supplementary.cloned()));
        }
    }

    fn symbol(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    #[test]
    fn feed_ids_are_sequential_and_stable() {
        let transport = InMemoryTransport::new();

        let aapl = transport.register_symbol(&symbol("AAPL"));
        let msft = transport.register_symbol(&symbol("MSFT"));

        assert_eq!(aapl, FeedId::new(1));
        assert_eq!(msft, FeedId::new(2));
        assert_eq!(transport.register_symbol(&symbol("aapl")), aapl);
        assert_eq!(transport.feed_id(&symbol("MSFT")), Some(msft));
        assert_eq!(transport.feed_id(&symbol("TSLA")), None);
        assert_eq!(
            transport.symbols(),
            vec![(symbol("AAPL"), aapl), (symbol("MSFT"), msft)]
        );
    }

    #[test]
    fn unavailable_transport_rejects_registration() {
        let transport = InMemoryTransport::new();
        transport.set_available(false);

        let result = transport.register_listener(FeedId::new(1), Arc::new(Recorder::default()));

        assert!(matches!(result, Err(FeedError::TransportUnavailable(_))));
        assert_eq!(transport.listener_count(FeedId::new(1)), 0);
    }

    #[test]
    fn publish_reaches_only_matching_feed() {
        let transport = InMemoryTransport::new();
        let on_one = Arc::new(Recorder::default());
        let on_two = Arc::new(Recorder::default());
        transport
            .register_listener(FeedId::new(1), Arc::clone(&on_one) as Arc<dyn FeedListener>)
            .unwrap();
        transport
            .register_listener(FeedId::new(2), Arc::clone(&on_two) as Arc<dyn FeedListener>)
            .unwrap();

        let extra = json!({"seq": 1});
        let count = transport.publish(FeedId::new(1), LEVEL1_TAG, &json!({"bid": 1}), Some(&extra));

        assert_eq!(count, 1);
        assert_eq!(
            *on_one.seen.lock(),
            vec![(LEVEL1_TAG, json!({"bid": 1}), Some(extra))]
        );
        assert!(on_two.seen.lock().is_empty());
    }

    #[test]
    fn deregistered_listener_receives_nothing() {
        let transport = InMemoryTransport::new();
        let recorder = Arc::new(Recorder::default());
        let handle = transport
            .register_listener(FeedId::new(3), Arc::clone(&recorder) as Arc<dyn FeedListener>)
            .unwrap();

        transport.deregister_listener(handle);
        transport.deregister_listener(handle);

        assert_eq!(transport.publish(FeedId::new(3), LEVEL1_TAG, &json!(1), None), 0);
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn load_state_tracking() {
        let transport = InMemoryTransport::new();
        let feed = transport.register_symbol(&symbol("AAPL"));
        assert!(!transport.is_feed_loaded(feed));

        transport.mark_loaded(feed);
        assert!(transport.is_feed_loaded(feed));

        transport.mark_unloaded(feed);
        assert!(!transport.is_feed_loaded(feed));

        transport.set_load_on_attach(true);
        transport
            .register_listener(feed, Arc::new(Recorder::default()))
            .unwrap();
        assert!(transport.is_feed_loaded(feed));
    }

    #[test]
    fn publish_symbol_unknown_is_noop() {
        let transport = InMemoryTransport::new();
        assert_eq!(
            transport.publish_symbol(&symbol("NONE"), LEVEL1_TAG, &json!(1), None),
            0
        );
    }
}
