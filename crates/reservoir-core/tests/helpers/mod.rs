//! Test helpers para reservoir-core.

#![allow(dead_code, unused_imports)]

pub mod loaders;

pub use loaders::{VersionedLoader, snapshot};

use std::time::Duration;

/// Polls `condition` on the real clock until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = std::time::Instant::now() + timeout;

    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    condition()
}

/// Offsets of `times` from `start`, rounded to whole milliseconds.
pub fn offsets_ms(start: tokio::time::Instant, times: &[tokio::time::Instant]) -> Vec<u64> {
    times
        .iter()
        .map(|t| t.saturating_duration_since(start).as_millis() as u64)
        .collect()
}
