//! File-backed dataset.

use std::collections::HashMap;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reservoir_core::{Entries, LoadError, Loader, MemSize};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Un valor del dataset, cualquier JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entry(pub Value);

impl MemSize for Entry {
    fn mem_size(&self) -> u64 {
        value_size(&self.0)
    }
}

fn value_size(value: &Value) -> u64 {
    let heap = match value {
        Value::String(s) => s.capacity() as u64,
        Value::Array(items) => {
            let spare = (items.capacity() - items.len()) * size_of::<Value>();
            spare as u64 + items.iter().map(value_size).sum::<u64>()
        },
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| key.mem_size() + value_size(value))
            .sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) => 0,
    };

    size_of::<Value>() as u64 + heap
}

/// Errores al cargar el dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse dataset {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("loading of dataset {} was cancelled", path.display())]
    Cancelled { path: PathBuf },
}

/// Loads a JSON object file, one entry per top-level key.
#[derive(Debug, Clone)]
pub struct JsonFileLoader {
    path: PathBuf,
}

impl JsonFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self, cancel: &CancellationToken) -> Result<HashMap<String, Entry>, DatasetError> {
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DatasetError::Cancelled { path: self.path.clone() });
            },
            raw = tokio::fs::read(&self.path) => raw.map_err(|source| DatasetError::Read {
                path: self.path.clone(),
                source,
            })?,
        };

        serde_json::from_slice(&raw).map_err(|source| DatasetError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl Loader<String, Entry> for JsonFileLoader {
    async fn load(&self, cancel: &CancellationToken) -> Result<Entries<String, Entry>, LoadError> {
        let document = self.read(cancel).await?;

        debug!(path = %self.path.display(), count = document.len(), "Dataset file read");

        Ok(document
            .into_iter()
            .map(|(key, value)| (key, Arc::new(value)))
            .collect())
    }
}
