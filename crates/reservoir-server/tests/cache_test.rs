//! Tests de los endpoints de control del cache.

mod helpers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use helpers::*;
use reservoir_core::{CacheParams, CacheSettings, Entries, LoadError, Timeouts};
use reservoir_server::Entry;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

const UPDATED: &str = r#"{
    "CZ": {"name": "Czechia", "capital": "Prague"},
    "PL": {"name": "Poland", "capital": "Warsaw"}
}"#;

#[tokio::test]
async fn forced_reload_picks_up_new_file() {
    let app = test_app(COUNTRIES).await;
    app.write_dataset(UPDATED);

    let response = app.client.post("/cache/reload").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["name"], "countries");
    assert_eq!(body["outcome"], "completed");
    assert_eq!(body["count"], 2);

    app.client.get("/entries/PL").await.assert_status(StatusCode::OK);
    app.client.get("/entries/SK").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_reload_keeps_snapshot() {
    let app = test_app(COUNTRIES).await;
    app.write_dataset("not json");

    let response = app.client.post("/cache/reload").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["count"], 3);
    app.client.get("/entries/SK").await.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn invalidate_is_accepted_and_reloads() {
    let app = test_app(COUNTRIES).await;
    app.write_dataset(UPDATED);

    let response = app.client.delete("/cache").await;
    response.assert_status(StatusCode::ACCEPTED);

    let body: Value = response.json();
    assert_eq!(body["name"], "countries");
    assert_eq!(body["message"], "Reload requested");

    let cache = Arc::clone(&app.cache);
    assert!(eventually(Duration::from_secs(2), || cache.get("PL").is_some()).await);
    assert_eq!(app.cache.len(), 2);
}

#[tokio::test]
async fn stats_report_cache_state() {
    let app = test_app(COUNTRIES).await;

    let body: Value = app.client.get("/cache/stats").await.json();

    assert_eq!(body["name"], "countries");
    assert_eq!(body["count"], 3);
    assert_eq!(body["reloading"], false);
    assert_eq!(body["loads"], 1);
    assert_eq!(body["invalidations"], 0);

    let next = body["next_reload_in_ms"].as_u64().unwrap();
    assert!(next <= 3_600_000 && next > 3_500_000, "{}", next);
}

#[tokio::test]
async fn stats_include_mem_size_once_computed() {
    let app = test_app(COUNTRIES).await;

    let cache = Arc::clone(&app.cache);
    assert!(eventually(Duration::from_secs(2), || cache.mem_size().is_some()).await);

    let body: Value = app.client.get("/cache/stats").await.json();
    assert!(body["mem_size_bytes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn stats_without_metrics() {
    let mut settings = CacheSettings::new("countries");
    settings.metrics = false;
    let app = test_app_with(COUNTRIES, settings).await;

    let body: Value = app.client.get("/cache/stats").await.json();

    assert!(body["loads"].is_null());
    assert!(body["mem_size_bytes"].is_null());
    // Default timeouts reload every 5 minutes.
    assert!(body["next_reload_in_ms"].as_u64().is_some());
}

#[tokio::test]
async fn overlapping_reload_returns_409() {
    let calls = Arc::new(AtomicU32::new(0));
    let loader = {
        let calls = Arc::clone(&calls);
        move |_cancel: CancellationToken| {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call > 1 {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                let mut entries: Entries<String, Entry> = HashMap::new();
                entries.insert("call".to_string(), Arc::new(Entry(json!(call))));
                Ok::<_, LoadError>(entries)
            }
        }
    };

    let cache = CacheParams::builder("slow")
        .loader(loader)
        .timeouts(Timeouts::every(Duration::from_secs(3600)))
        .start()
        .await
        .unwrap();
    let (client, cache) = app_for(cache);
    let client = Arc::new(client);

    let slow = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.post("/cache/reload").await })
    };
    assert!(eventually(Duration::from_secs(1), || cache.is_reloading()).await);

    let rejected = client.post("/cache/reload").await;
    rejected.assert_status(StatusCode::CONFLICT);
    let body: Value = rejected.json();
    assert_eq!(body["error"], "Conflict");

    let completed = slow.await.unwrap();
    completed.assert_status(StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.get("call").unwrap().0, json!(2));
}
