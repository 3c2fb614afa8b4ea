//! Subscription Types
//!
//! Tokens identifying registrations at both ends of a stock handle, plus the
//! handle's observable load state and status snapshot.
//!
//! # Design
//!
//! Two registrations exist for every loaded handle:
//! - Downstream, each consumer callback on a stream is identified by a
//!   [`SubscriptionToken`] issued by the stream.
//! - Upstream, the handle's listener registration with the transport is
//!   identified by a [`SubscriptionHandle`] issued by the transport.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{FeedId, Symbol};
use super::streaming::StreamKind;

// =============================================================================
// Tokens
// =============================================================================

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque token returned by a stream subscription, used to unsubscribe.
///
/// Tokens are unique across the process, so a token can never remove a
/// subscriber from a stream that did not issue it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    id: u64,
    kind: StreamKind,
}

impl SubscriptionToken {
    /// Issue a fresh token for a stream of the given kind.
    #[must_use]
    pub fn issue(kind: StreamKind) -> Self {
        Self {
            id: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            kind,
        }
    }

    /// The kind of stream that issued this token.
    #[must_use]
    pub const fn kind(&self) -> StreamKind {
        self.kind
    }
}

impl fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Transport-issued identifier of one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a raw transport registration id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw transport registration id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

// =============================================================================
// Load State
// =============================================================================

/// Observable lifecycle state of a stock handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    /// No subscription; streams are inert.
    Unloaded,
    /// Registered with the transport, initial snapshot not yet arrived.
    Pending,
    /// Registered and the transport reports data flowing.
    Loaded,
}

impl LoadState {
    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Pending => "pending",
            Self::Loaded => "loaded",
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Statistics for a single stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    /// Stream kind.
    pub kind: StreamKind,
    /// Number of registered subscribers.
    pub subscribers: usize,
    /// Notifications delivered on this stream.
    pub delivered: u64,
}

/// Point-in-time status of a stock handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleStatus {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Feed id while attached.
    pub feed_id: Option<FeedId>,
    /// Lifecycle state.
    pub state: LoadState,
    /// When the current attachment was made.
    pub attached_since: Option<DateTime<Utc>>,
    /// Per-stream statistics, in [`StreamKind::all`] order.
    pub streams: Vec<StreamStats>,
    /// Notifications dropped because their tag was not recognized.
    pub unrecognized: u64,
}

impl HandleStatus {
    /// Total notifications delivered across all streams.
    #[must_use]
    pub fn total_delivered(&self) -> u64 {
        self.streams.iter().map(|s| s.delivered).sum()
    }

    /// Total subscribers across all streams.
    #[must_use]
    pub fn total_subscribers(&self) -> usize {
        self.streams.iter().map(|s| s.subscribers).sum()
    }
}
