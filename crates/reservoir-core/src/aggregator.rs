//! Invalidation aggregation (debouncing).
//!
//! The first invalidation after an idle period triggers the action right
//! away and opens a protection window of `flush_interval`. Invalidations
//! arriving inside the window are folded into exactly one deferred action
//! that runs when the window closes; that deferred action opens a new window.
//!
//! ```text
//! t=0.0  notify  -> action (window until 3.0)
//! t=2.1  notify  -> deferred to 3.0
//! t=2.2  notify  -> coalesced
//! t=3.0          -> action (window until 6.0)
//! t=4.2  notify  -> deferred to 6.0
//! ```
//!
//! The window state is a single tagged value behind a mutex, so two
//! notifications racing at the moment a window expires cannot both fire.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Work triggered by the aggregator.
pub type Action = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// What a single [`Aggregator::notify`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The action was started immediately.
    Immediate,
    /// The action was scheduled for the end of the current window.
    Deferred,
    /// An action is already scheduled for this window.
    Coalesced,
    /// The aggregator was cancelled.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowState {
    Idle,
    Windowed { until: Instant },
    Pending { until: Instant },
}

struct Shared {
    flush_interval: Duration,
    action: Action,
    cancel: CancellationToken,
    state: Mutex<WindowState>,
}

/// Debounces notifications into actions spaced at least `flush_interval`
/// apart.
#[derive(Clone)]
pub struct Aggregator {
    shared: Arc<Shared>,
}

impl Aggregator {
    /// Creates an idle aggregator.
    ///
    /// Pending deferred actions are dropped without running once `cancel`
    /// fires.
    pub fn new(flush_interval: Duration, cancel: CancellationToken, action: Action) -> Self {
        Self {
            shared: Arc::new(Shared {
                flush_interval,
                action,
                cancel,
                state: Mutex::new(WindowState::Idle),
            }),
        }
    }

    /// Returns the protection window length.
    pub fn flush_interval(&self) -> Duration {
        self.shared.flush_interval
    }

    /// Records one notification. Never blocks on the action.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn notify(&self) -> NotifyOutcome {
        if self.shared.cancel.is_cancelled() {
            return NotifyOutcome::Stopped;
        }

        let now = Instant::now();
        let mut state = self.shared.state.lock();
        let current = *state;

        match current {
            WindowState::Windowed { until } if until > now => {
                *state = WindowState::Pending { until };
                drop(state);

                trace!(
                    flush_in_ms = until.saturating_duration_since(now).as_millis() as u64,
                    "Invalidation deferred"
                );
                self.schedule_flush(until);
                NotifyOutcome::Deferred
            },
            // The wake-up for this window is already scheduled, even if its
            // deadline has just passed and it did not get the lock yet.
            WindowState::Pending { .. } => NotifyOutcome::Coalesced,
            WindowState::Idle | WindowState::Windowed { .. } => {
                *state = WindowState::Windowed {
                    until: now + self.shared.flush_interval,
                };
                drop(state);

                trace!("Invalidation fired immediately");
                tokio::spawn((self.shared.action)());
                NotifyOutcome::Immediate
            },
        }
    }

    fn schedule_flush(&self, until: Instant) {
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => {
                    debug!("Aggregator cancelled, deferred invalidation dropped");
                },
                _ = tokio::time::sleep_until(until) => {
                    *shared.state.lock() = WindowState::Windowed {
                        until: Instant::now() + shared.flush_interval,
                    };
                    trace!("Deferred invalidation fired");
                    (shared.action)().await;
                },
            }
        });
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("flush_interval", &self.shared.flush_interval)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn counting_action(counter: &Arc<AtomicU64>) -> Action {
        let counter = Arc::clone(counter);
        Arc::new(move || -> BoxFuture<'static, ()> {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_timing() {
        let counter = Arc::new(AtomicU64::new(0));
        let aggregator = Aggregator::new(
            Duration::from_secs(3),
            CancellationToken::new(),
            counting_action(&counter),
        );

        // 0 s
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(aggregator.notify(), NotifyOutcome::Immediate);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        sleep_ms(2000).await;

        // 2.1 s
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.notify(), NotifyOutcome::Deferred);
        assert_eq!(aggregator.notify(), NotifyOutcome::Coalesced);
        assert_eq!(aggregator.notify(), NotifyOutcome::Coalesced);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        sleep_ms(2000).await;

        // 4.2 s, deferred action ran at 3 s and opened a window until 6 s
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(aggregator.notify(), NotifyOutcome::Deferred);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        sleep_ms(1000).await;

        // 5.3 s
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        sleep_ms(2000).await;

        // 7.3 s
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        sleep_ms(4000).await;

        // 11.3 s, idle long enough for an immediate action
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(aggregator.notify(), NotifyOutcome::Immediate);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(aggregator.notify(), NotifyOutcome::Deferred);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        sleep_ms(1000).await;

        // 12.5 s
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_drops_deferred_action() {
        let counter = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();
        let aggregator = Aggregator::new(
            Duration::from_secs(3),
            cancel.clone(),
            counting_action(&counter),
        );

        // 0 s
        aggregator.notify();
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        sleep_ms(2000).await;

        // 2.1 s
        aggregator.notify();
        aggregator.notify();
        aggregator.notify();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        cancel.cancel();
        sleep_ms(5000).await;

        // 7.1 s
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.notify(), NotifyOutcome::Stopped);
        sleep_ms(100).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_notifications_fire_once_per_window() {
        let counter = Arc::new(AtomicU64::new(0));
        let aggregator = Aggregator::new(
            Duration::from_secs(60),
            CancellationToken::new(),
            counting_action(&counter),
        );

        let mut handles = Vec::new();
        for _ in 0..64 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move { aggregator.notify() }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let count = |wanted| outcomes.iter().filter(|o| **o == wanted).count();
        assert_eq!(count(NotifyOutcome::Immediate), 1);
        assert_eq!(count(NotifyOutcome::Deferred), 1);
        assert_eq!(count(NotifyOutcome::Coalesced), 62);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expired_fires_immediately() {
        let counter = Arc::new(AtomicU64::new(0));
        let aggregator = Aggregator::new(
            Duration::from_secs(1),
            CancellationToken::new(),
            counting_action(&counter),
        );

        assert_eq!(aggregator.notify(), NotifyOutcome::Immediate);
        sleep_ms(1500).await;
        assert_eq!(aggregator.notify(), NotifyOutcome::Immediate);
        sleep_ms(10).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
