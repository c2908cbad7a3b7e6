//! Reload schedule configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing parameters of a cache instance.
///
/// ```
/// use std::time::Duration;
/// use reservoir_core::Timeouts;
///
/// let timeouts: Timeouts = serde_json::from_str(
///     r#"{"reloadInterval": "5m", "reloadDelay": "10s", "jitter": 0.1}"#,
/// ).unwrap();
///
/// assert_eq!(timeouts.reload_interval, Duration::from_secs(300));
/// assert!(timeouts.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// How often the whole dataset is reloaded. Zero disables periodic reloads.
    ///
    /// Every time the next reload is scheduled this duration is randomized by
    /// `jitter`.
    #[serde(default, alias = "reload_interval", with = "humantime_serde")]
    pub reload_interval: Duration,

    /// Protection window after an invalidation-driven reload.
    ///
    /// The first invalidation after an idle period reloads immediately. Every
    /// further invalidation inside the window is folded into a single reload
    /// at the window's end. Zero disables aggregation, so each invalidation
    /// forces its own reload.
    #[serde(default, alias = "reload_delay", with = "humantime_serde")]
    pub reload_delay: Duration,

    /// Fraction of `reload_interval` used to randomize it, within `[0, 1]`.
    ///
    /// 0 means no randomization, 0.1 means the interval varies by +/- 10%.
    #[serde(default)]
    pub jitter: f64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reload_interval: Duration::from_secs(300),
            reload_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl Timeouts {
    /// Creates timeouts without jitter or aggregation.
    pub fn every(reload_interval: Duration) -> Self {
        Self {
            reload_interval,
            reload_delay: Duration::ZERO,
            jitter: 0.0,
        }
    }

    /// Sets the invalidation protection window.
    pub fn with_reload_delay(mut self, reload_delay: Duration) -> Self {
        self.reload_delay = reload_delay;
        self
    }

    /// Sets the jitter fraction.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns true if periodic reloading is enabled.
    pub fn periodic_enabled(&self) -> bool {
        !self.reload_interval.is_zero()
    }

    /// Returns true if invalidations are aggregated.
    pub fn aggregation_enabled(&self) -> bool {
        !self.reload_delay.is_zero()
    }

    /// Checks the invariants between the fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reload_delay > self.reload_interval {
            return Err(ConfigError::DelayExceedsInterval {
                delay: self.reload_delay,
                interval: self.reload_interval,
            });
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::JitterOutOfRange(self.jitter));
        }

        Ok(())
    }

    /// Returns `reload_interval` +/- `reload_interval * jitter`, freshly
    /// randomized on every call.
    pub fn randomized_interval(&self) -> Duration {
        randomize(self.reload_interval, self.jitter)
    }
}

/// Spreads `base` uniformly over `[base * (1 - jitter), base * (1 + jitter)]`.
pub(crate) fn randomize(base: Duration, jitter: f64) -> Duration {
    if base.is_zero() || jitter <= 0.0 {
        return base;
    }

    let base_secs = base.as_secs_f64();
    let spread = base_secs * jitter.min(1.0);
    let offset = rand::rng().random_range(-spread..=spread);

    Duration::from_secs_f64((base_secs + offset).max(0.0))
}
