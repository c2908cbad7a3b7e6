//! Dataset loader abstraction.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;

/// One complete dataset, as produced by a single load.
pub type Entries<K, T> = HashMap<K, Arc<T>>;

/// A source of the complete dataset held by a cache.
///
/// The cache never calls `load` concurrently with itself for one instance,
/// but it calls it repeatedly for the lifetime of the cache. Implementations
/// should return promptly once `cancel` fires.
///
/// Closures returning a future implement this trait, so most callers never
/// write an impl by hand:
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use reservoir_core::{Entries, LoadError, Loader};
/// use tokio_util::sync::CancellationToken;
///
/// fn countries() -> impl Loader<String, String> {
///     |_cancel: CancellationToken| async move {
///         let mut entries: Entries<String, String> = HashMap::new();
///         entries.insert("CZ".to_string(), Arc::new("Czechia".to_string()));
///         Ok::<_, LoadError>(entries)
///     }
/// }
/// ```
#[async_trait]
pub trait Loader<K, T>: Send + Sync + 'static {
    /// Loads the whole dataset.
    ///
    /// # Errors
    ///
    /// Any error keeps the previously published snapshot in place.
    async fn load(&self, cancel: &CancellationToken) -> Result<Entries<K, T>, LoadError>;
}

#[async_trait]
impl<K, T, F, Fut> Loader<K, T> for F
where
    K: Send + 'static,
    T: Send + Sync + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Entries<K, T>, LoadError>> + Send + 'static,
{
    async fn load(&self, cancel: &CancellationToken) -> Result<Entries<K, T>, LoadError> {
        (self)(cancel.clone()).await
    }
}

/// Shared handle to a type-erased loader.
pub type SharedLoader<K, T> = Arc<dyn Loader<K, T>>;
