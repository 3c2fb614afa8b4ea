//! Instrument Identity Types
//!
//! `Symbol` is the textual identity callers use; `FeedId` is the opaque
//! numeric identifier the upstream transport routes on. The two are kept as
//! distinct types so a feed id can never stand in for a symbol.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Maximum accepted symbol length in bytes.
pub const MAX_SYMBOL_LEN: usize = 32;

// =============================================================================
// Symbol
// =============================================================================

/// Immutable, normalized instrument symbol (e.g. `AAPL`).
///
/// Cloning is cheap: the text is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Parse and normalize a symbol.
    ///
    /// Surrounding whitespace is trimmed and the result is upper-cased.
    ///
    /// # Errors
    ///
    /// Returns [`SymbolError`] if the text is empty, contains whitespace, or
    /// is longer than [`MAX_SYMBOL_LEN`].
    pub fn parse(text: &str) -> Result<Self, SymbolError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(SymbolError::ContainsWhitespace(trimmed.to_string()));
        }
        if trimmed.len() > MAX_SYMBOL_LEN {
            return Err(SymbolError::TooLong(trimmed.len()));
        }
        Ok(Self(Arc::from(trimmed.to_uppercase())))
    }

    /// The normalized symbol text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", &self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0.to_string()
    }
}

impl std::str::FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Invalid symbol text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolError {
    /// Symbol is empty after trimming.
    #[error("symbol cannot be empty")]
    Empty,
    /// Symbol has whitespace between characters.
    #[error("symbol {0:?} contains whitespace")]
    ContainsWhitespace(String),
    /// Symbol exceeds the maximum length.
    #[error("symbol is {0} bytes long, maximum is {MAX_SYMBOL_LEN}")]
    TooLong(usize),
}

// =============================================================================
// Feed Id
// =============================================================================

/// Transport-internal identifier for a subscribed instrument.
///
/// Only meaningful to the transport that issued it and only for the lifetime
/// of that transport's symbol registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(u32);

impl FeedId {
    /// Wrap a raw transport identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw transport identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feed#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_is_normalized() {
        let symbol = Symbol::parse("  aapl ").unwrap();
        assert_eq!(symbol.as_str(), "AAPL");
        assert_eq!(symbol.to_string(), "AAPL");
    }

    #[test]
    fn symbol_equality_ignores_input_case() {
        assert_eq!(Symbol::parse("msft").unwrap(), Symbol::parse("MSFT").unwrap());
    }

    #[test]
    fn empty_symbol_rejected() {
        assert_eq!(Symbol::parse("   "), Err(SymbolError::Empty));
    }

    #[test]
    fn whitespace_symbol_rejected() {
        assert!(matches!(
            Symbol::parse("BRK B"),
            Err(SymbolError::ContainsWhitespace(_))
        ));
    }

    #[test]
    fn long_symbol_rejected() {
        let text = "X".repeat(MAX_SYMBOL_LEN + 1);
        assert_eq!(
            Symbol::parse(&text),
            Err(SymbolError::TooLong(MAX_SYMBOL_LEN + 1))
        );
    }

    #[test]
    fn symbol_serde_uses_plain_string() {
        let symbol = Symbol::parse("spy").unwrap();
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"SPY\"");

        let back: Symbol = serde_json::from_str("\"qqq\"").unwrap();
        assert_eq!(back.as_str(), "QQQ");

        assert!(serde_json::from_str::<Symbol>("\"\"").is_err());
    }

    #[test]
    fn feed_id_display() {
        let id = FeedId::new(42);
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "feed#42");
    }
}
