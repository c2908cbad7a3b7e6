//! Loaders with observable behaviour.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reservoir_core::{Entries, LoadError, Loader};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Number of `keyN` entries in every snapshot, besides `version`.
pub const KEYS: u64 = 10;

/// Snapshot produced by the `version`-th load.
///
/// `keyN` maps to `version * 1000 + N`, so a reader can tell whether two
/// values come from the same load.
pub fn snapshot(version: u64) -> Entries<String, u64> {
    let mut entries: Entries<String, u64> = (0..KEYS)
        .map(|i| (format!("key{}", i), Arc::new(version * 1000 + i)))
        .collect();
    entries.insert("version".to_string(), Arc::new(version));
    entries
}

#[derive(Default)]
struct Inner {
    calls: AtomicU64,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    started: Mutex<Vec<Instant>>,
}

/// Returns [`snapshot`]`(n)` on its n-th call.
#[derive(Clone, Default)]
pub struct VersionedLoader {
    inner: Arc<Inner>,
}

impl VersionedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every load takes `delay` before returning.
    pub fn with_delay(delay: Duration) -> Self {
        let loader = Self::default();
        *loader.inner.delay.lock() = delay;
        loader
    }

    /// Makes the following loads fail.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Times at which each load started.
    pub fn load_times(&self) -> Vec<Instant> {
        self.inner.started.lock().clone()
    }
}

#[async_trait]
impl Loader<String, u64> for VersionedLoader {
    async fn load(&self, _cancel: &CancellationToken) -> Result<Entries<String, u64>, LoadError> {
        let version = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.started.lock().push(Instant::now());

        let delay = *self.inner.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(format!("load {} failed", version).into());
        }

        Ok(snapshot(version))
    }
}

/// Entries never change; handy where only the call count matters.
pub fn empty_loader() -> impl Loader<String, u64> {
    |_cancel: CancellationToken| async { Ok::<Entries<String, u64>, LoadError>(HashMap::new()) }
}
