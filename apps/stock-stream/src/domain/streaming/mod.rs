//! Market Data Streaming Types
//!
//! Stream kinds exposed by a stock handle and the transient notification
//! the transport pushes for each update. Payloads are opaque JSON values:
//! the core routes them, it never decodes prices or sizes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque update payload passed through to subscribers unchanged.
pub type Payload = serde_json::Value;

// =============================================================================
// Stream Kind
// =============================================================================

/// Transport tag for level 1 (top-of-book) updates.
pub const LEVEL1_TAG: u16 = 1;
/// Transport tag for level 2 (depth-of-book) updates.
pub const LEVEL2_TAG: u16 = 2;
/// Transport tag for trade prints.
pub const PRINTS_TAG: u16 = 3;
/// Transport tag for account updates.
pub const ACCOUNT_TAG: u16 = 4;

/// One of the four streams a stock handle publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Best bid/ask quote.
    Level1,
    /// Full depth-of-book order data.
    Level2,
    /// Reported executed trades.
    Prints,
    /// Account updates routed through the same feed.
    Account,
}

impl StreamKind {
    /// Get all stream kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Level1, Self::Level2, Self::Prints, Self::Account]
    }

    /// Classify a transport tag.
    ///
    /// Returns `None` for tags this crate does not know, which the
    /// multiplexer drops.
    #[must_use]
    pub const fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            LEVEL1_TAG => Some(Self::Level1),
            LEVEL2_TAG => Some(Self::Level2),
            PRINTS_TAG => Some(Self::Prints),
            ACCOUNT_TAG => Some(Self::Account),
            _ => None,
        }
    }

    /// The transport tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u16 {
        match self {
            Self::Level1 => LEVEL1_TAG,
            Self::Level2 => LEVEL2_TAG,
            Self::Prints => PRINTS_TAG,
            Self::Account => ACCOUNT_TAG,
        }
    }

    /// Dense index, used to address per-kind storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Level1 => 0,
            Self::Level2 => 1,
            Self::Prints => 2,
            Self::Account => 3,
        }
    }

    /// Stable name for logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Level1 => "level1",
            Self::Level2 => "level2",
            Self::Prints => "prints",
            Self::Account => "account",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Update Notification
// =============================================================================

/// A single update pushed by the transport.
///
/// Borrowed for the duration of one dispatch call; the core never retains
/// it. Subscribers that need to keep data must clone the payload.
#[derive(Debug, Clone, Copy)]
pub struct UpdateNotification<'a> {
    /// Raw stream-kind tag as sent by the transport.
    pub tag: u16,
    /// Primary payload.
    pub payload: &'a Payload,
    /// Optional supplementary payload (e.g. the message that triggered it).
    pub supplementary: Option<&'a Payload>,
}

impl<'a> UpdateNotification<'a> {
    /// Create a notification without a supplementary payload.
    #[must_use]
    pub const fn new(tag: u16, payload: &'a Payload) -> Self {
        Self {
            tag,
            payload,
            supplementary: None,
        }
    }

    /// Attach a supplementary payload.
    #[must_use]
    pub const fn with_supplementary(mut self, supplementary: &'a Payload) -> Self {
        self.supplementary = Some(supplementary);
        self
    }

    /// Create a notification for a known stream kind.
    #[must_use]
    pub const fn for_kind(kind: StreamKind, payload: &'a Payload) -> Self {
        Self::new(kind.tag(), payload)
    }

    /// The stream kind this notification belongs to, if recognized.
    #[must_use]
    pub const fn kind(&self) -> Option<StreamKind> {
        StreamKind::from_tag(self.tag)
    }
}
