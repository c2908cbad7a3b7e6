//! Error types for the snapshot cache.

/// Error returned by a [`Loader`](crate::Loader).
///
/// Loaders wrap whatever their backend produces; the cache only logs it.
pub type LoadError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid construction parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The cache name is empty.
    #[error("cache name must be set")]
    MissingName,

    /// No loader was supplied.
    #[error("loader must be provided")]
    MissingLoader,

    /// The invalidation window is longer than the reload interval.
    #[error("reload delay ({delay:?}) must be less than or equal to reload interval ({interval:?})")]
    DelayExceedsInterval {
        delay: std::time::Duration,
        interval: std::time::Duration,
    },

    /// The jitter fraction is outside `[0, 1]`.
    #[error("jitter must be within [0, 1], got {0}")]
    JitterOutOfRange(f64),
}

/// Errors surfaced by [`Cache::new`](crate::Cache::new).
///
/// After construction the cache never fails outward: reload failures are
/// logged and the last good snapshot keeps being served.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The construction parameters were rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The first, synchronous load failed.
    #[error("initial load of cache '{name}' failed: {source}")]
    InitialLoad {
        name: String,
        #[source]
        source: LoadError,
    },
}

impl CacheError {
    /// Creates a new initial load error.
    pub fn initial_load(name: impl Into<String>, source: LoadError) -> Self {
        Self::InitialLoad {
            name: name.into(),
            source,
        }
    }

    /// Returns true if the error was caused by invalid parameters.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
