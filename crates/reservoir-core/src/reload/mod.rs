//! Reload engine: the single-flight controller and the periodic driver.

mod controller;
mod driver;

pub use controller::{ReloadController, ReloadOutcome};
pub use driver::PeriodicReload;

pub(crate) use controller::SizeTracker;
