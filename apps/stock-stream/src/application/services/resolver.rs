//! Symbol Identity Resolver
//!
//! Maps a symbol to the feed id the transport routes on. Reads the
//! transport's registry and never writes to it.

use std::sync::Arc;

use crate::application::ports::SymbolDirectory;
use crate::domain::error::FeedError;
use crate::domain::identity::{FeedId, Symbol};

/// Resolves symbols against the transport's symbol registry.
#[derive(Clone)]
pub struct SymbolResolver {
    directory: Arc<dyn SymbolDirectory>,
}

impl SymbolResolver {
    /// Create a resolver over a symbol registry.
    #[must_use]
    pub fn new(directory: Arc<dyn SymbolDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a symbol to its feed id.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownSymbol`] if the transport has no mapping
    /// for the symbol. The caller may retry once the transport has finished
    /// initializing.
    pub fn resolve(&self, symbol: &Symbol) -> Result<FeedId, FeedError> {
        let Some(feed_id) = self.directory.feed_id(symbol) else {
            tracing::debug!(symbol = %symbol, "Symbol has no feed id");
            return Err(FeedError::UnknownSymbol(symbol.clone()));
        };
        Ok(feed_id)
    }
}

impl std::fmt::Debug for SymbolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolResolver").finish_non_exhaustive()
    }
}
