//! Stream Multiplexer
//!
//! Receives every notification for one handle's feed, classifies it by its
//! tag and delivers it to the matching stream only.
//!
//! # Dispatch gate
//!
//! The multiplexer carries an open/closed gate. Every dispatch holds the
//! gate's read side for its whole duration; closing takes the write side, so
//! [`StreamMultiplexer::close`] returns only after in-flight dispatches have
//! finished, and no dispatch delivers anything after that. Dispatches on
//! different streams share the read side and run concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use super::stream::Stream;
use crate::application::ports::{FeedListener, MetricsPort, NoopMetrics};
use crate::domain::identity::Symbol;
use crate::domain::streaming::{StreamKind, UpdateNotification};

/// Result of dispatching one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered to a stream's subscribers.
    Delivered {
        /// Stream the notification was routed to.
        kind: StreamKind,
        /// Number of callbacks invoked.
        subscribers: usize,
    },
    /// Tag not recognized; dropped and counted.
    Unrecognized(u16),
    /// Gate closed (handle unloaded); dropped silently.
    Closed,
}

/// Routes notifications to the four streams of one symbol.
pub struct StreamMultiplexer {
    symbol: Symbol,
    streams: [Stream; 4],
    gate: RwLock<bool>,
    unrecognized: AtomicU64,
    metrics: Arc<dyn MetricsPort>,
}

impl StreamMultiplexer {
    /// Create a multiplexer with a closed gate and empty streams.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        let streams = [
            Stream::new(symbol.clone(), StreamKind::Level1),
            Stream::new(symbol.clone(), StreamKind::Level2),
            Stream::new(symbol.clone(), StreamKind::Prints),
            Stream::new(symbol.clone(), StreamKind::Account),
        ];
        Self {
            symbol,
            streams,
            gate: RwLock::new(false),
            unrecognized: AtomicU64::new(0),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Report dispatches to `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPort>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The symbol whose updates this multiplexer routes.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// The stream for a kind.
    #[must_use]
    pub const fn stream(&self, kind: StreamKind) -> &Stream {
        &self.streams[kind.index()]
    }

    /// All streams, in [`StreamKind::all`] order.
    #[must_use]
    pub const fn streams(&self) -> &[Stream; 4] {
        &self.streams
    }

    /// Classify and deliver one notification.
    ///
    /// Must not be called while holding the write side of the gate, i.e.
    /// a subscriber callback must not close this multiplexer.
    pub fn dispatch(&self, notification: &UpdateNotification<'_>) -> DispatchOutcome {
        // Recursive read: a callback may cause the transport to push another
        // update for this feed on the same thread, and a pending close must
        // not block that nested dispatch.
        let gate = self.gate.read_recursive();
        if !*gate {
            return DispatchOutcome::Closed;
        }

        let Some(kind) = notification.kind() else {
            self.unrecognized.fetch_add(1, Ordering::Relaxed);
            self.metrics.unrecognized();
            tracing::debug!(
                symbol = %self.symbol,
                tag = notification.tag,
                "Dropping notification with unrecognized tag"
            );
            return DispatchOutcome::Unrecognized(notification.tag);
        };

        let started = Instant::now();
        let subscribers = self
            .stream(kind)
            .deliver(notification.payload, notification.supplementary);
        drop(gate);

        self.metrics.dispatched(kind, started.elapsed());
        DispatchOutcome::Delivered { kind, subscribers }
    }

    /// Open the gate so dispatches deliver.
    pub fn open(&self) {
        *self.gate.write() = true;
    }

    /// Close the gate, waiting for in-flight dispatches to finish.
    pub fn close(&self) {
        *self.gate.write() = false;
    }

    /// Whether dispatches currently deliver.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.gate.read_recursive()
    }

    /// Notifications dropped because their tag was not recognized.
    #[must_use]
    pub fn unrecognized(&self) -> u64 {
        self.unrecognized.load(Ordering::Relaxed)
    }
}

impl FeedListener for StreamMultiplexer {
    fn on_notification(&self, notification: &UpdateNotification<'_>) {
        self.dispatch(notification);
    }
}

impl std::fmt::Debug for StreamMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamMultiplexer")
            .field("symbol", &self.symbol)
            .field("open", &self.is_open())
            .field("unrecognized", &self.unrecognized())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
