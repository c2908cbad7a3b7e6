//! HTTP handlers.

pub mod cache;
pub mod entries;
pub mod health;
pub mod metrics;
