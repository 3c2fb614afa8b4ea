//! Publishable Stream
//!
//! One stream of a stock handle: a set of subscriber callbacks and a
//! delivery operation.
//!
//! # Concurrency
//!
//! The subscriber list is copy-on-write behind a lock. A delivery clones the
//! current list (one `Arc` bump) and invokes the callbacks without holding
//! the list lock, so:
//! - a subscriber added during a delivery does not see that update,
//! - a subscriber removed during a delivery still sees it if it was in the
//!   snapshot.
//!
//! Deliveries on one stream are serialized so subscribers observe updates in
//! the order the transport pushed them. Streams are independent of each
//! other: a slow callback on one stream never delays another.
//!
//! The serialization lock is reentrant. A callback that causes another
//! delivery on the same stream from the same thread gets it delivered in
//! full before its own call returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{ReentrantMutex, RwLock};

use crate::domain::identity::Symbol;
use crate::domain::streaming::{Payload, StreamKind};
use crate::domain::subscription::{StreamStats, SubscriptionToken};

/// Subscriber callback: `(payload, supplementary payload)`.
///
/// Callbacks run on the transport's delivery thread and should be short and
/// non-blocking.
pub type UpdateCallback = dyn Fn(&Payload, Option<&Payload>) + Send + Sync;

#[derive(Clone)]
struct Subscriber {
    token: SubscriptionToken,
    callback: Arc<UpdateCallback>,
}

/// A publishable endpoint for one kind of update.
pub struct Stream {
    symbol: Symbol,
    kind: StreamKind,
    subscribers: RwLock<Arc<[Subscriber]>>,
    delivery: ReentrantMutex<()>,
    delivered: AtomicU64,
}

impl Stream {
    /// Create an empty stream.
    #[must_use]
    pub fn new(symbol: Symbol, kind: StreamKind) -> Self {
        Self {
            symbol,
            kind,
            subscribers: RwLock::new(Arc::from(Vec::new())),
            delivery: ReentrantMutex::new(()),
            delivered: AtomicU64::new(0),
        }
    }

    /// The symbol this stream belongs to.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The kind of updates this stream carries.
    #[must_use]
    pub const fn kind(&self) -> StreamKind {
        self.kind
    }

    /// Register a callback. Returns a token for [`Self::unsubscribe`].
    ///
    /// Subscribing is allowed in any load state; no updates arrive until the
    /// owning handle is loaded.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&Payload, Option<&Payload>) + Send + Sync + 'static,
    {
        let token = SubscriptionToken::issue(self.kind);
        let subscriber = Subscriber {
            token,
            callback: Arc::new(callback),
        };

        let mut subscribers = self.subscribers.write();
        let mut next: Vec<Subscriber> = subscribers.to_vec();
        next.push(subscriber);
        *subscribers = Arc::from(next);
        drop(subscribers);

        tracing::debug!(symbol = %self.symbol, stream = %self.kind, %token, "Subscriber added");
        token
    }

    /// Remove a callback.
    ///
    /// Returns `false` if the token was not issued by this stream or was
    /// already removed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        if token.kind() != self.kind {
            return false;
        }

        let mut subscribers = self.subscribers.write();
        if !subscribers.iter().any(|s| s.token == token) {
            return false;
        }
        let next: Vec<Subscriber> = subscribers
            .iter()
            .filter(|s| s.token != token)
            .cloned()
            .collect();
        *subscribers = Arc::from(next);
        drop(subscribers);

        tracing::debug!(symbol = %self.symbol, stream = %self.kind, %token, "Subscriber removed");
        true
    }

    /// Deliver one update to every subscriber in the current snapshot.
    ///
    /// Returns the number of callbacks invoked.
    pub fn deliver(&self, payload: &Payload, supplementary: Option<&Payload>) -> usize {
        let _ordered = self.delivery.lock();
        let snapshot = Arc::clone(&*self.subscribers.read());

        for subscriber in snapshot.iter() {
            (subscriber.callback)(payload, supplementary);
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        snapshot.len()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Number of updates delivered on this stream.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            kind: self.kind,
            subscribers: self.subscriber_count(),
            delivered: self.delivered(),
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("symbol", &self.symbol)
            .field("kind", &self.kind)
            .field("subscribers", &self.subscriber_count())
            .field("delivered", &self.delivered())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
