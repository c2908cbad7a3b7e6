//! Construction parameters of a cache instance.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::invalidation::{BoxedSource, InvalidationSource};
use crate::loader::{Entries, Loader, SharedLoader};
use crate::memsize::{MemSize, SizeEstimator, entries_size};
use crate::timeouts::Timeouts;

/// Serializable part of the cache parameters, as read from configuration
/// files.
///
/// ```
/// use std::time::Duration;
/// use reservoir_core::CacheSettings;
///
/// let settings: CacheSettings = serde_json::from_str(r#"{
///     "name": "countries",
///     "timeouts": {"reloadInterval": "10m", "reloadDelay": "5s"},
///     "trackMemSize": true
/// }"#).unwrap();
///
/// assert_eq!(settings.timeouts.reload_interval, Duration::from_secs(600));
/// assert!(settings.metrics);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Instance name, used in logs and as the `name` metric label.
    pub name: String,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Whether to publish cache metrics.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Whether to estimate the snapshot size after every reload.
    #[serde(default, alias = "track_mem_size")]
    pub track_mem_size: bool,
}

fn default_true() -> bool {
    true
}

impl CacheSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timeouts: Timeouts::default(),
            metrics: true,
            track_mem_size: false,
        }
    }
}

/// Validated parameters, consumed by [`Cache::new`](crate::Cache::new).
pub struct CacheParams<K, T> {
    pub(crate) name: String,
    pub(crate) loader: SharedLoader<K, T>,
    pub(crate) timeouts: Timeouts,
    pub(crate) sources: Vec<BoxedSource>,
    pub(crate) metrics: bool,
    pub(crate) size_estimator: Option<SizeEstimator<K, T>>,
    pub(crate) parent: Option<CancellationToken>,
}

impl<K, T> CacheParams<K, T> {
    /// Creates a builder for the cache called `name`.
    pub fn builder(name: impl Into<String>) -> CacheParamsBuilder<K, T> {
        CacheParamsBuilder {
            name: name.into(),
            loader: None,
            timeouts: Timeouts::default(),
            sources: Vec::new(),
            metrics: false,
            size_estimator: None,
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }
}

impl<K, T> std::fmt::Debug for CacheParams<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheParams")
            .field("name", &self.name)
            .field("timeouts", &self.timeouts)
            .field("sources", &self.sources.len())
            .field("metrics", &self.metrics)
            .field("size_estimator", &self.size_estimator.is_some())
            .finish()
    }
}

/// Builder for [`CacheParams`].
pub struct CacheParamsBuilder<K, T> {
    name: String,
    loader: Option<SharedLoader<K, T>>,
    timeouts: Timeouts,
    sources: Vec<BoxedSource>,
    metrics: bool,
    size_estimator: Option<SizeEstimator<K, T>>,
    parent: Option<CancellationToken>,
}

impl<K, T> CacheParamsBuilder<K, T> {
    /// Sets the dataset loader.
    pub fn loader(mut self, loader: impl Loader<K, T>) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Sets an already shared loader.
    pub fn shared_loader(mut self, loader: SharedLoader<K, T>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Sets the reload timeouts.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Adds an invalidation source.
    pub fn invalidation_source(mut self, source: impl InvalidationSource) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Enables cache metrics.
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    /// Sets a snapshot size estimator.
    pub fn size_estimator<F>(mut self, estimator: F) -> Self
    where
        F: Fn(&Entries<K, T>) -> u64 + Send + Sync + 'static,
    {
        self.size_estimator = Some(Arc::new(estimator));
        self
    }

    /// Ties the cache lifetime to `parent`: cancelling it stops every
    /// background task of the cache.
    pub fn cancellation(mut self, parent: CancellationToken) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builds the parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the loader is missing, or the
    /// timeouts are inconsistent.
    pub fn build(self) -> Result<CacheParams<K, T>, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }

        let loader = self.loader.ok_or(ConfigError::MissingLoader)?;
        self.timeouts.validate()?;

        Ok(CacheParams {
            name: self.name,
            loader,
            timeouts: self.timeouts,
            sources: self.sources,
            metrics: self.metrics,
            size_estimator: self.size_estimator,
            parent: self.parent,
        })
    }
}

impl<K, T> CacheParamsBuilder<K, T>
where
    K: MemSize + 'static,
    T: MemSize + 'static,
{
    /// Estimates the snapshot size with [`MemSize`].
    pub fn track_mem_size(self) -> Self {
        self.size_estimator(entries_size::<K, T>)
    }

    /// Applies file-based settings: timeouts, metrics and size tracking.
    pub fn settings(mut self, settings: &CacheSettings) -> Self {
        self.timeouts = settings.timeouts;
        self.metrics = settings.metrics;
        if settings.track_mem_size {
            self = self.track_mem_size();
        }
        self
    }
}
