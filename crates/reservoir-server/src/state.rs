//! Application state.

use std::sync::Arc;

use reservoir_core::Cache;

use crate::dataset::Entry;

/// Cache of the served dataset.
pub type DatasetCache = Cache<String, Entry>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    cache: Arc<DatasetCache>,
}

impl AppState {
    pub fn new(cache: Arc<DatasetCache>) -> Self {
        Self { cache }
    }

    /// Returns a reference to the dataset cache.
    pub fn cache(&self) -> &DatasetCache {
        self.cache.as_ref()
    }
}
