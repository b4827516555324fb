//! Configuration management
//!
//! Read from `config.toml` (or the file named by `LEDGER_CONFIG`). Every
//! field has a default, so a missing file yields a working in-memory ledger.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::blockchain::hash::HASH_HEX_LEN;

/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Seconds a single proof-of-work search may run; 0 means unbounded
    #[serde(default = "default_mining_timeout")]
    pub mining_timeout_secs: u64,
}

impl LedgerConfig {
    pub fn mining_timeout(&self) -> Option<Duration> {
        match self.mining_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            difficulty: default_difficulty(),
            mining_timeout_secs: default_mining_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_data_dir")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: default_data_dir(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path`, falling back to defaults when it is absent
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }

        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Loads from `LEDGER_CONFIG` or `config.toml`
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.difficulty > HASH_HEX_LEN {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most {}, got {}",
                HASH_HEX_LEN, self.ledger.difficulty
            )));
        }

        if self.storage.backend == Backend::Sled && self.storage.path.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.path must be set for the sled backend".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_name() -> String {
    "Transaction Blockchain".to_string()
}

fn default_difficulty() -> usize {
    4
}

fn default_mining_timeout() -> u64 {
    60
}

fn default_data_dir() -> String {
    "data/ledger".to_string()
}
