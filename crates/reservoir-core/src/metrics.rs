//! Cache metrics recording.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{Counter, Gauge, counter, gauge};

const ITEMS_COUNT: &str = "reservoir_cache_items_count";
const LOAD_COUNT: &str = "reservoir_cache_load_count";
const RECEIVED_INVALIDATIONS: &str = "reservoir_cache_received_invalidations";
const MEMORY_USAGE: &str = "reservoir_cache_memory_usage";
const RELOAD_INTERVAL: &str = "reservoir_cache_reload_interval_seconds";

/// Describes the cache metrics to the installed recorder.
///
/// Call once at startup, before any cache is built.
pub fn describe_cache_metrics() {
    metrics::describe_gauge!(ITEMS_COUNT, "Count of cached items");
    metrics::describe_counter!(LOAD_COUNT, "Total number of complete loads");
    metrics::describe_counter!(
        RECEIVED_INVALIDATIONS,
        "Total number of received invalidations"
    );
    metrics::describe_gauge!(
        MEMORY_USAGE,
        metrics::Unit::Bytes,
        "Current memory usage in bytes by entries"
    );
    metrics::describe_gauge!(
        RELOAD_INTERVAL,
        metrics::Unit::Seconds,
        "Configured base reload interval"
    );
}

/// Push-only metrics of one cache instance, labelled with its name.
///
/// The values are mirrored in local atomics so they can be inspected
/// without a recorder.
#[derive(Clone)]
pub struct CacheMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    items_count: Gauge,
    load_count: Counter,
    received_invalidations: Counter,
    memory_usage: Gauge,
    reload_interval: Gauge,
    loads: AtomicU64,
    invalidations: AtomicU64,
    items: AtomicU64,
}

impl CacheMetrics {
    /// Registers the metric handles for the cache called `name`.
    pub fn new(name: &str) -> Self {
        let label = name.to_string();

        Self {
            inner: Arc::new(Inner {
                items_count: gauge!(ITEMS_COUNT, "name" => label.clone()),
                load_count: counter!(LOAD_COUNT, "name" => label.clone()),
                received_invalidations: counter!(RECEIVED_INVALIDATIONS, "name" => label.clone()),
                memory_usage: gauge!(MEMORY_USAGE, "name" => label.clone()),
                reload_interval: gauge!(RELOAD_INTERVAL, "name" => label),
                loads: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
                items: AtomicU64::new(0),
            }),
        }
    }

    /// Records a load attempt that reached the loader.
    pub fn record_load(&self) {
        self.inner.loads.fetch_add(1, Ordering::Relaxed);
        self.inner.load_count.increment(1);
    }

    /// Records an invalidation signal received from a source.
    pub fn record_invalidation(&self) {
        self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
        self.inner.received_invalidations.increment(1);
    }

    /// Sets the item count of the current snapshot.
    pub fn update_items_count(&self, count: usize) {
        self.inner.items.store(count as u64, Ordering::Relaxed);
        self.inner.items_count.set(count as f64);
    }

    /// Sets the last estimated snapshot size.
    pub fn update_memory_usage(&self, bytes: u64) {
        self.inner.memory_usage.set(bytes as f64);
    }

    /// Publishes the configured base interval, before jitter.
    pub fn update_reload_interval(&self, interval: Duration) {
        self.inner.reload_interval.set(interval.as_secs_f64());
    }

    /// Total load attempts that reached the loader.
    pub fn loads(&self) -> u64 {
        self.inner.loads.load(Ordering::Relaxed)
    }

    /// Total invalidation signals received from sources.
    pub fn invalidations(&self) -> u64 {
        self.inner.invalidations.load(Ordering::Relaxed)
    }

    /// Item count of the last successful load.
    pub fn items(&self) -> u64 {
        self.inner.items.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for CacheMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheMetrics")
            .field("loads", &self.loads())
            .field("invalidations", &self.invalidations())
            .field("items", &self.items())
            .finish()
    }
}
