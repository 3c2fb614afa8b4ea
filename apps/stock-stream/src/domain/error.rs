//! Feed Errors
//!
//! Failures reported by the resolver, the feed subscription and the stock
//! handle. None of them is fatal: each is local to one handle and is returned
//! from the operation that failed.

use super::identity::Symbol;

/// Error raised while resolving or attaching a symbol's feed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The transport has no feed id registered for the symbol.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(Symbol),
    /// The upstream connectivity layer is not ready to accept listeners.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}

impl FeedError {
    /// Whether retrying the operation later can succeed.
    ///
    /// Both variants depend on transport state that changes over time, so
    /// both are recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownSymbol(_) | Self::TransportUnavailable(_))
    }

    /// Short label used for metrics and structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownSymbol(_) => "unknown_symbol",
            Self::TransportUnavailable(_) => "transport_unavailable",
        }
    }
}
