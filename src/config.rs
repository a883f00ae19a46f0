//! Runtime configuration
//!
//! Read from `config/asset-ledger.toml` when present, then from `ASSET_LEDGER__*`
//! environment variables (`ASSET_LEDGER__STORAGE__PATH=/var/lib/ledger`). Every
//! field has a default, so an empty environment yields a working setup.
use crate::error::Result;
use crate::store::Store;
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_CONFIG_FILE: &str = "config/asset-ledger.toml";
const ENV_PREFIX: &str = "ASSET_LEDGER";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Throw the database away on drop. Handy for demos.
    #[serde(default)]
    pub temporary: bool,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// `None` disables the background flusher.
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive. `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BootstrapConfig {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/asset-ledger.db")
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024
}

fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}

fn default_log_filter() -> String {
    "asset_ledger=info".to_string()
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            temporary: false,
            cache_capacity: default_cache_capacity(),
            flush_every_ms: default_flush_every_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file (optional) and the environment.
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from `path` (optional) and the environment. Environment values win.
    pub fn load_from(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|err| {
                ConfigError::Message(format!(
                    "failed to read configuration from {} and the environment: {err}",
                    path.display()
                ))
            })?;

        settings.try_deserialize()
    }
}

impl StorageConfig {
    pub fn open(&self) -> Result<Store> {
        let db = sled::Config::new()
            .path(&self.path)
            .temporary(self.temporary)
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms)
            .open()?;
        Store::new(Arc::new(db))
    }
}
