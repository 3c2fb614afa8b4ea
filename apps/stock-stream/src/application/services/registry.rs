//! Stock Book
//!
//! Process-level registry holding at most one [`StockHandle`] per symbol.
//! Two handles for the same symbol would attach twice to one feed and
//! double-deliver every update, so all handle creation should go through
//! [`StockBook::get_or_insert`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::stock_handle::StockHandle;
use crate::application::ports::FeedContext;
use crate::domain::error::FeedError;
use crate::domain::identity::Symbol;
use crate::domain::subscription::{HandleStatus, LoadState};

/// Registry of stock handles keyed by symbol.
#[derive(Debug)]
pub struct StockBook {
    context: FeedContext,
    handles: RwLock<HashMap<Symbol, Arc<StockHandle>>>,
}

impl StockBook {
    /// Create an empty book whose handles use `context`.
    #[must_use]
    pub fn new(context: FeedContext) -> Self {
        Self {
            context,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Return the handle for `symbol`, creating an unloaded one if needed.
    pub fn get_or_insert(&self, symbol: &Symbol) -> Arc<StockHandle> {
        if let Some(handle) = self.handles.read().get(symbol) {
            return Arc::clone(handle);
        }

        let mut handles = self.handles.write();
        let handle = handles.entry(symbol.clone()).or_insert_with(|| {
            tracing::debug!(symbol = %symbol, "Creating stock handle");
            Arc::new(StockHandle::new(symbol.clone(), &self.context))
        });
        Arc::clone(handle)
    }

    /// The handle for `symbol`, if one exists.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<Arc<StockHandle>> {
        self.handles.read().get(symbol).cloned()
    }

    /// Clear the handle for `symbol` and drop it from the book.
    pub fn remove(&self, symbol: &Symbol) -> Option<Arc<StockHandle>> {
        let handle = self.handles.write().remove(symbol)?;
        handle.clear();
        self.update_loaded_gauge();
        Some(handle)
    }

    /// Load every handle. Returns the symbols that failed with their errors.
    pub fn load_all(&self) -> Vec<(Symbol, FeedError)> {
        let failures: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter_map(|handle| {
                handle
                    .load()
                    .err()
                    .map(|e| (handle.symbol().clone(), e))
            })
            .collect();
        self.update_loaded_gauge();
        failures
    }

    /// Clear every handle. Handles stay in the book.
    pub fn clear_all(&self) {
        for handle in self.snapshot() {
            handle.clear();
        }
        self.update_loaded_gauge();
    }

    /// Registered symbols, sorted.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.handles.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Number of handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Whether the book holds no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Status of every handle, sorted by symbol.
    #[must_use]
    pub fn statuses(&self) -> Vec<HandleStatus> {
        let mut statuses: Vec<_> = self.snapshot().iter().map(|h| h.status()).collect();
        statuses.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        statuses
    }

    /// Handles are loaded and cleared outside the map lock.
    fn snapshot(&self) -> Vec<Arc<StockHandle>> {
        self.handles.read().values().cloned().collect()
    }

    fn update_loaded_gauge(&self) {
        let attached = self
            .snapshot()
            .iter()
            .filter(|h| h.load_state() != LoadState::Unloaded)
            .count();
        self.context.metrics().attached_handles(attached);
    }
}

// =============================================================================
// Tests
// =============================================================================
