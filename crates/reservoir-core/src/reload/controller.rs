//! Single-flight reload of the whole dataset.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::loader::{Entries, SharedLoader};
use crate::memsize::{SizeEstimator, estimate_isolated};
use crate::metrics::CacheMetrics;
use crate::snapshot::SnapshotStore;
use crate::timeouts::Timeouts;

/// Result of one reload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot was published.
    Completed,
    /// Another reload was in flight; nothing happened.
    RejectedBusy,
    /// An unforced reload arrived before its scheduled time.
    RejectedTooEarly,
    /// The loader failed; the previous snapshot is still served.
    Failed,
}

impl ReloadOutcome {
    /// Returns true if the attempt was turned away before reaching the loader.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::RejectedBusy | Self::RejectedTooEarly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::RejectedBusy => "rejected_busy",
            Self::RejectedTooEarly => "rejected_too_early",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ReloadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct ReloadState {
    in_flight: bool,
    next_reload_at: Option<Instant>,
}

/// Last computed snapshot size, when size tracking is enabled.
pub(crate) struct SizeTracker<K, T> {
    estimator: SizeEstimator<K, T>,
    bytes: Arc<AtomicU64>,
}

impl<K, T> SizeTracker<K, T> {
    pub(crate) fn new(estimator: SizeEstimator<K, T>) -> Self {
        Self {
            estimator,
            bytes: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Serializes reload attempts and publishes their results.
pub struct ReloadController<K, T> {
    name: String,
    loader: SharedLoader<K, T>,
    store: SnapshotStore<K, T>,
    timeouts: Timeouts,
    state: Mutex<ReloadState>,
    rearm: mpsc::Sender<()>,
    cancel: CancellationToken,
    metrics: Option<CacheMetrics>,
    size: Option<SizeTracker<K, T>>,
}

impl<K, T> ReloadController<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Creates a controller serving `initial`.
    ///
    /// Returns the receiving half of the re-arm channel, meant for the
    /// periodic driver.
    pub(crate) fn new(
        name: String,
        loader: SharedLoader<K, T>,
        initial: Entries<K, T>,
        timeouts: Timeouts,
        cancel: CancellationToken,
        metrics: Option<CacheMetrics>,
        size: Option<SizeTracker<K, T>>,
    ) -> (Self, mpsc::Receiver<()>) {
        let (rearm, rearm_rx) = mpsc::channel(1);

        let controller = Self {
            name,
            loader,
            store: SnapshotStore::new(initial),
            timeouts,
            state: Mutex::new(ReloadState::default()),
            rearm,
            cancel,
            metrics,
            size,
        };

        (controller, rearm_rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &SnapshotStore<K, T> {
        &self.store
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn metrics(&self) -> Option<&CacheMetrics> {
        self.metrics.as_ref()
    }

    /// When the next periodic reload is due.
    pub fn next_reload_at(&self) -> Option<Instant> {
        self.state.lock().next_reload_at
    }

    pub fn is_reloading(&self) -> bool {
        self.state.lock().in_flight
    }

    /// Last recorded snapshot size in bytes, `None` when size tracking is off.
    pub fn mem_size(&self) -> Option<u64> {
        self.size
            .as_ref()
            .map(|size| size.bytes.load(Ordering::Relaxed))
    }

    /// Schedules the first periodic reload relative to now.
    ///
    /// Called once, right after the initial load.
    pub(crate) fn schedule_from_now(&self) -> Option<Instant> {
        if !self.timeouts.periodic_enabled() {
            return None;
        }

        let next = Instant::now() + self.timeouts.randomized_interval();
        self.state.lock().next_reload_at = Some(next);
        Some(next)
    }

    /// Runs one reload attempt.
    ///
    /// Forced attempts skip the schedule check but are still rejected while
    /// another attempt is in flight. Never blocks on another attempt.
    pub async fn attempt_reload(&self, force: bool) -> ReloadOutcome {
        let started = Instant::now();

        let guard = match InFlight::acquire(&self.state, &self.rearm, started, force) {
            Ok(guard) => guard,
            Err(rejected) => {
                trace!(cache = %self.name, force, reason = %rejected, "Reload skipped");
                return rejected;
            },
        };

        debug!(cache = %self.name, force, "Loading started");

        let outcome = match self.loader.load(&self.cancel).await {
            Ok(entries) => {
                let count = self.store.publish(entries);

                if let Some(metrics) = &self.metrics {
                    metrics.update_items_count(count);
                }
                self.spawn_size_update();

                debug!(
                    cache = %self.name,
                    count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Loading finished"
                );
                ReloadOutcome::Completed
            },
            Err(error) => {
                warn!(
                    cache = %self.name,
                    error = %error,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Loading failed"
                );
                ReloadOutcome::Failed
            },
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_load();
        }

        // Failed loads advance the schedule too: no retry before the next slot.
        let next = self
            .timeouts
            .periodic_enabled()
            .then(|| started + self.timeouts.randomized_interval());

        guard.finish(next);

        if let Some(next) = next {
            trace!(
                cache = %self.name,
                next_reload_in_ms = next.saturating_duration_since(Instant::now()).as_millis() as u64,
                "Next reload scheduled"
            );
            self.signal_rearm();
        }

        outcome
    }

    /// Recomputes the snapshot size on the blocking pool.
    ///
    /// A panicking estimator is logged and the previous value is kept.
    pub(crate) fn spawn_size_update(&self) {
        let Some(size) = &self.size else {
            return;
        };

        let entries = self.store.load();
        let estimator = Arc::clone(&size.estimator);
        let bytes = Arc::clone(&size.bytes);
        let metrics = self.metrics.clone();
        let name = self.name.clone();

        tokio::task::spawn_blocking(move || match estimate_isolated(&estimator, &entries) {
            Ok(value) => {
                bytes.store(value, Ordering::Relaxed);
                if let Some(metrics) = &metrics {
                    metrics.update_memory_usage(value);
                }
                trace!(
                    cache = %name,
                    bytes = value,
                    mb = value as f64 / 1_000_000.0,
                    "Memory size calculation finished"
                );
            },
            Err(panic) => {
                warn!(
                    cache = %name,
                    panic = %panic,
                    "Panic occurred during cache size calculation"
                );
            },
        });
    }

    fn signal_rearm(&self) {
        // A full slot already wakes the driver; a closed one means it stopped.
        let _ = self.rearm.try_send(());
    }
}

/// Holds the single-flight flag for one attempt.
///
/// Dropping it without [`InFlight::finish`], because the loader panicked or
/// the attempt's future was dropped, still clears the flag and re-arms the
/// driver, which may be waiting on this attempt.
struct InFlight<'a> {
    state: &'a Mutex<ReloadState>,
    rearm: &'a mpsc::Sender<()>,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn acquire(
        state: &'a Mutex<ReloadState>,
        rearm: &'a mpsc::Sender<()>,
        started: Instant,
        force: bool,
    ) -> Result<Self, ReloadOutcome> {
        let mut locked = state.lock();

        if locked.in_flight {
            return Err(ReloadOutcome::RejectedBusy);
        }

        if !force && locked.next_reload_at.is_some_and(|next| started < next) {
            return Err(ReloadOutcome::RejectedTooEarly);
        }

        locked.in_flight = true;

        Ok(Self {
            state,
            rearm,
            finished: false,
        })
    }

    /// Clears the flag and moves the schedule forward, never backward.
    fn finish(mut self, next: Option<Instant>) {
        let mut locked = self.state.lock();
        locked.in_flight = false;

        if let Some(next) = next {
            locked.next_reload_at = Some(match locked.next_reload_at {
                Some(previous) if previous > next => previous,
                _ => next,
            });
        }

        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.lock().in_flight = false;
            let _ = self.rearm.try_send(());
        }
    }
}

/// Time left until `deadline`, zero if it already passed.
pub(crate) fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
