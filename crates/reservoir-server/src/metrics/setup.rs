//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Buckets de latencia HTTP, en segundos (100us a 10s).
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Instala el recorder global de Prometheus y retorna el handle para el endpoint.
///
/// # Errors
///
/// Falla si ya hay un recorder instalado.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()?;

    register_all();

    info!("Metrics system initialized");
    Ok(handle)
}

/// Describe todas las metricas conocidas al recorder instalado.
pub fn register_all() {
    reservoir_core::describe_cache_metrics();
    super::http::register_http_metrics();
}
