//! Metrics module for Reservoir Server.
//!
//! Cache metrics themselves are recorded by `reservoir_core`; this module
//! installs the Prometheus recorder and adds HTTP metrics.

pub mod http;
pub mod setup;

pub use http::{http_metrics_middleware, register_http_metrics};
pub use setup::{init_metrics, register_all};
