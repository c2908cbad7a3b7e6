//! Reservoir Core - full-dataset snapshot cache
//!
//! Keeps a complete, slowly changing dataset in memory and serves lock-free
//! reads against an immutable snapshot. The snapshot is replaced wholesale by
//! a single-flight reload, triggered on a jittered schedule or by
//! invalidation signals that are debounced through a protection window.
//!
//! ## Modulos
//!
//! - [`cache`] - the [`Cache`] façade
//! - [`params`] - construction parameters and builder
//! - [`reload`] - single-flight reload controller and periodic driver
//! - [`aggregator`] - invalidation debouncing
//! - [`invalidation`] - external invalidation sources
//! - [`snapshot`] - lock-free snapshot holder
//! - [`memsize`] - approximate snapshot size
//! - [`metrics`] - cache metrics

pub mod aggregator;
pub mod cache;
pub mod error;
pub mod invalidation;
pub mod loader;
pub mod memsize;
pub mod metrics;
pub mod params;
pub mod reload;
pub mod snapshot;
pub mod timeouts;

pub use aggregator::{Aggregator, NotifyOutcome};
pub use cache::Cache;
pub use error::{CacheError, ConfigError, LoadError};
pub use invalidation::{BusSubscription, InvalidationBus, InvalidationSource};
pub use loader::{Entries, Loader, SharedLoader};
pub use memsize::{MemSize, SizeEstimator, entries_size};
pub use metrics::{CacheMetrics, describe_cache_metrics};
pub use params::{CacheParams, CacheParamsBuilder, CacheSettings};
pub use reload::ReloadOutcome;
pub use timeouts::Timeouts;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
