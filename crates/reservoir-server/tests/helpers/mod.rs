//! Test helpers para reservoir-server.

#![allow(dead_code, unused_imports)]

pub mod client;
pub mod fixtures;

pub use client::{TestClient, TestResponse};
pub use fixtures::{COUNTRIES, TestApp, app_for, eventually, test_app, test_app_with};
