//! The cache façade.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::aggregator::{Action, Aggregator, NotifyOutcome};
use crate::error::CacheError;
use crate::invalidation::spawn_listener;
use crate::loader::Entries;
use crate::metrics::CacheMetrics;
use crate::params::{CacheParams, CacheParamsBuilder};
use crate::reload::{PeriodicReload, ReloadController, ReloadOutcome, SizeTracker};

/// In-memory copy of a complete dataset, refreshed as a whole.
///
/// Reads never block and never fail: they hit the snapshot published by the
/// last successful load. The snapshot is refreshed on a jittered schedule
/// and whenever [`invalidate_all`](Self::invalidate_all) is called, with
/// bursts of invalidations coalesced by the protection window.
///
/// Dropping the cache stops every background task it started.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use std::time::Duration;
/// use reservoir_core::{Cache, CacheParams, Entries, LoadError, Timeouts};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let params = CacheParams::builder("countries")
///     .loader(|_cancel: CancellationToken| async {
///         let mut entries: Entries<String, String> = HashMap::new();
///         entries.insert("CZ".into(), Arc::new("Czechia".into()));
///         Ok::<_, LoadError>(entries)
///     })
///     .timeouts(Timeouts::every(Duration::from_secs(300)).with_reload_delay(Duration::from_secs(5)))
///     .build()?;
///
/// let cache = Cache::new(params).await?;
///
/// if let Some(country) = cache.get("CZ") {
///     println!("CZ is {}", country);
/// }
/// cache.invalidate_all();
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, T> {
    controller: Arc<ReloadController<K, T>>,
    invalidator: Invalidator<K, T>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<K, T> Cache<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Loads the dataset once and starts the background tasks.
    ///
    /// Nothing is started when the first load fails.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InitialLoad`] if the loader fails.
    pub async fn new(params: CacheParams<K, T>) -> Result<Self, CacheError> {
        let CacheParams {
            name,
            loader,
            timeouts,
            sources,
            metrics,
            size_estimator,
            parent,
        } = params;

        let cancel = match parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let metrics = metrics.then(|| CacheMetrics::new(&name));

        let started = Instant::now();
        let loaded = loader.load(&cancel).await;
        if let Some(metrics) = &metrics {
            metrics.record_load();
        }

        let initial = match loaded {
            Ok(entries) => entries,
            Err(source) => {
                warn!(cache = %name, error = %source, "Initial load failed");
                return Err(CacheError::initial_load(name, source));
            },
        };

        let count = initial.len();
        if let Some(metrics) = &metrics {
            metrics.update_items_count(count);
            metrics.update_reload_interval(timeouts.reload_interval);
        }

        let (controller, rearm) = ReloadController::new(
            name,
            loader,
            initial,
            timeouts,
            cancel.clone(),
            metrics,
            size_estimator.map(SizeTracker::new),
        );
        let controller = Arc::new(controller);
        let name = controller.name().to_string();

        if controller.schedule_from_now().is_some() {
            PeriodicReload::new(Arc::clone(&controller), rearm, cancel.clone()).start();
        } else {
            debug!(cache = %name, "Periodic reload disabled");
        }

        let invalidator = Invalidator::new(&controller, &cancel);
        if !timeouts.aggregation_enabled() {
            warn!(
                cache = %name,
                "Invalidation aggregation disabled, every invalidation forces a reload"
            );
        }

        for source in sources {
            let invalidator = invalidator.clone();
            let metrics = controller.metrics().cloned();

            spawn_listener(name.clone(), source, cancel.clone(), move || {
                if let Some(metrics) = &metrics {
                    metrics.record_invalidation();
                }
                invalidator.invalidate();
            });
        }

        controller.spawn_size_update();

        info!(
            cache = %name,
            count,
            duration_ms = started.elapsed().as_millis() as u64,
            reload_interval = ?timeouts.reload_interval,
            reload_delay = ?timeouts.reload_delay,
            "Cache initialized"
        );

        Ok(Self {
            controller,
            invalidator,
            _guard: cancel.clone().drop_guard(),
            cancel,
        })
    }

    /// Returns the value stored under `key` in the current snapshot.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.controller.store().get(key)
    }

    /// Returns the whole current snapshot.
    ///
    /// The snapshot never changes; later reloads publish a new one.
    pub fn get_all(&self) -> Arc<Entries<K, T>> {
        self.controller.store().load()
    }

    /// Requests a reload of the whole dataset. Returns immediately.
    ///
    /// With a protection window configured, bursts of calls collapse into at
    /// most one reload per window.
    pub fn invalidate_all(&self) {
        self.invalidator.invalidate();
    }

    /// Runs a forced reload and waits for its outcome.
    ///
    /// Bypasses the protection window but is still rejected while another
    /// reload is in flight.
    pub async fn reload_now(&self) -> ReloadOutcome {
        self.controller.attempt_reload(true).await
    }

    pub fn name(&self) -> &str {
        self.controller.name()
    }

    /// Number of entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.controller.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.controller.store().is_empty()
    }

    /// Approximate snapshot size in bytes, `None` when size tracking is off.
    pub fn mem_size(&self) -> Option<u64> {
        self.controller.mem_size()
    }

    /// Time left until the next periodic reload, `None` when periodic
    /// reloads are disabled.
    pub fn next_reload_in(&self) -> Option<Duration> {
        self.controller
            .next_reload_at()
            .map(|next| next.saturating_duration_since(Instant::now()))
    }

    pub fn is_reloading(&self) -> bool {
        self.controller.is_reloading()
    }

    pub fn metrics(&self) -> Option<&CacheMetrics> {
        self.controller.metrics()
    }

    /// Stops every background task. Reads keep serving the last snapshot.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(cache = %self.name(), "Cache shut down");
        }
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<K, T> std::fmt::Debug for Cache<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.controller.name())
            .field("timeouts", self.controller.timeouts())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<K, T> CacheParamsBuilder<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Validates the parameters and starts the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] for invalid parameters and
    /// [`CacheError::InitialLoad`] if the first load fails.
    pub async fn start(self) -> Result<Cache<K, T>, CacheError> {
        Cache::new(self.build()?).await
    }
}

/// Routes invalidations either through the aggregator or straight to a
/// forced reload.
enum Invalidator<K, T> {
    Aggregated(Aggregator),
    Direct {
        controller: Arc<ReloadController<K, T>>,
        cancel: CancellationToken,
    },
}

impl<K, T> Clone for Invalidator<K, T> {
    fn clone(&self) -> Self {
        match self {
            Self::Aggregated(aggregator) => Self::Aggregated(aggregator.clone()),
            Self::Direct { controller, cancel } => Self::Direct {
                controller: Arc::clone(controller),
                cancel: cancel.clone(),
            },
        }
    }
}

impl<K, T> Invalidator<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn new(controller: &Arc<ReloadController<K, T>>, cancel: &CancellationToken) -> Self {
        let delay = controller.timeouts().reload_delay;

        if delay.is_zero() {
            return Self::Direct {
                controller: Arc::clone(controller),
                cancel: cancel.clone(),
            };
        }

        let target = Arc::clone(controller);
        let action: Action = Arc::new(move || -> BoxFuture<'static, ()> {
            let controller = Arc::clone(&target);
            Box::pin(async move {
                controller.attempt_reload(true).await;
            })
        });

        Self::Aggregated(Aggregator::new(delay, cancel.clone(), action))
    }

    fn invalidate(&self) {
        match self {
            Self::Aggregated(aggregator) => {
                if aggregator.notify() == NotifyOutcome::Stopped {
                    debug!("Invalidation ignored, cache is shut down");
                }
            },
            Self::Direct { controller, cancel } => {
                if cancel.is_cancelled() {
                    debug!(cache = %controller.name(), "Invalidation ignored, cache is shut down");
                    return;
                }

                let controller = Arc::clone(controller);
                tokio::spawn(async move {
                    controller.attempt_reload(true).await;
                });
            },
        }
    }
}
