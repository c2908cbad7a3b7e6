//! Background periodic reload.

use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::controller::{ReloadController, ReloadOutcome, remaining};

/// Waits for the next scheduled reload and runs it.
///
/// The deadline is re-read from the controller on every iteration. Any
/// completed reload posts a re-arm signal, so a fresher schedule preempts
/// the timer that is currently running.
pub struct PeriodicReload<K, T> {
    controller: Arc<ReloadController<K, T>>,
    rearm: mpsc::Receiver<()>,
    cancel: CancellationToken,
}

impl<K, T> PeriodicReload<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub(crate) fn new(
        controller: Arc<ReloadController<K, T>>,
        rearm: mpsc::Receiver<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            controller,
            rearm,
            cancel,
        }
    }

    /// Starts the background task.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(
            cache = %self.controller.name(),
            interval = ?self.controller.timeouts().reload_interval,
            jitter = self.controller.timeouts().jitter,
            "Starting periodic reload"
        );

        loop {
            let Some(deadline) = self.controller.next_reload_at() else {
                debug!(cache = %self.controller.name(), "No reload scheduled, periodic reload stopped");
                return;
            };

            trace!(
                cache = %self.controller.name(),
                next_reload_in_ms = remaining(deadline).as_millis() as u64,
                "Waiting for next reload"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.stop();
                    return;
                },
                signal = self.rearm.recv() => {
                    if signal.is_none() {
                        return;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    let outcome = self.controller.attempt_reload(false).await;

                    // The attempt in flight re-arms us once it finishes.
                    if outcome == ReloadOutcome::RejectedBusy && !self.wait_for_rearm().await {
                        return;
                    }
                },
            }
        }
    }

    /// Returns false if the driver has to stop.
    async fn wait_for_rearm(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.stop();
                false
            },
            signal = self.rearm.recv() => signal.is_some(),
        }
    }

    fn stop(&mut self) {
        self.rearm.close();
        debug!(cache = %self.controller.name(), "Periodic reload stopped");
    }
}
