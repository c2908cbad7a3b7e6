//! Server settings.
//!
//! Loaded from an optional YAML/JSON/TOML file, overridden by environment
//! variables prefixed with `RESERVOIR_`. Nested keys use `__`:
//!
//! ```text
//! RESERVOIR_PORT=9000
//! RESERVOIR_DATASET_PATH=/data/countries.json
//! RESERVOIR_CACHE__TIMEOUTS__RELOAD_INTERVAL=10m
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use reservoir_core::CacheSettings;
use serde::Deserialize;

/// Variable con la ruta del archivo de configuracion.
pub const CONFIG_PATH_VAR: &str = "RESERVOIR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "reservoir.yaml";
const ENV_PREFIX: &str = "RESERVOIR";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid listen address '{address}': {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON object file served as the dataset.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    #[serde(default = "default_cache")]
    pub cache: CacheSettings,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset.json")
}

fn default_cache() -> CacheSettings {
    CacheSettings::new("dataset")
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dataset_path: default_dataset_path(),
            cache: default_cache(),
        }
    }
}

impl ServerSettings {
    /// Loads the settings from the file named by `RESERVOIR_CONFIG`
    /// (default `reservoir.yaml`) and the environment.
    pub fn load() -> Result<Self, SettingsError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Loads the settings from `path`, if it exists, and the environment.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Socket address to listen on.
    pub fn addr(&self) -> Result<SocketAddr, SettingsError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|source| SettingsError::InvalidAddress { address, source })
    }
}
