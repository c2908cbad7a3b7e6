//! Reservoir Server - HTTP service for the Reservoir snapshot cache
//!
//! Serves a JSON dataset file through a [`reservoir_core::Cache`] and exposes
//! invalidation, forced reloads, cache statistics and Prometheus metrics.

pub mod dataset;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod settings;
pub mod state;

pub use dataset::{DatasetError, Entry, JsonFileLoader};
pub use error::AppError;
pub use server::{create_router, run_server_with_state, spawn_reload_on_hangup};
pub use settings::{ServerSettings, SettingsError};
pub use state::{AppState, DatasetCache};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
