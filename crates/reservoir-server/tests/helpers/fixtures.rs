//! Dataset files and a running app for tests.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use reservoir_core::{CacheParams, CacheSettings, Timeouts};
use reservoir_server::{AppState, DatasetCache, JsonFileLoader, create_router};
use tempfile::NamedTempFile;

use super::client::TestClient;

pub const COUNTRIES: &str = r#"{
    "CZ": {"name": "Czechia", "capital": "Prague"},
    "SK": {"name": "Slovakia", "capital": "Bratislava"},
    "AT": {"name": "Austria", "capital": "Vienna"}
}"#;

/// A router over a cache backed by a temporary dataset file.
pub struct TestApp {
    pub client: TestClient,
    pub cache: Arc<DatasetCache>,
    pub dataset: NamedTempFile,
}

impl TestApp {
    /// Replaces the dataset file content.
    pub fn write_dataset(&self, content: &str) {
        std::fs::write(self.dataset.path(), content).unwrap();
    }
}

pub async fn test_app(content: &str) -> TestApp {
    let mut settings = CacheSettings::new("countries");
    settings.timeouts = Timeouts::every(Duration::from_secs(3600));
    settings.track_mem_size = true;

    test_app_with(content, settings).await
}

pub async fn test_app_with(content: &str, settings: CacheSettings) -> TestApp {
    let mut dataset = NamedTempFile::new().unwrap();
    dataset.write_all(content.as_bytes()).unwrap();

    let cache = CacheParams::builder(settings.name.clone())
        .loader(JsonFileLoader::new(dataset.path()))
        .settings(&settings)
        .start()
        .await
        .unwrap();
    let cache = Arc::new(cache);

    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let router = create_router(AppState::new(Arc::clone(&cache)), prometheus);

    TestApp {
        client: TestClient::new(router),
        cache,
        dataset,
    }
}

/// Builds the app around an already started cache.
pub fn app_for(cache: DatasetCache) -> (TestClient, Arc<DatasetCache>) {
    let cache = Arc::new(cache);
    let prometheus = PrometheusBuilder::new().build_recorder().handle();
    let router = create_router(AppState::new(Arc::clone(&cache)), prometheus);

    (TestClient::new(router), cache)
}

/// Polls `condition` every 10 ms until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
