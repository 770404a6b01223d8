//! Runtime configuration for the database pool and logging.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_DATABASE_URL: &str = "SIMPLEBANK_DATABASE_URL";
const ENV_MAX_CONNECTIONS: &str = "SIMPLEBANK_MAX_CONNECTIONS";
const ENV_ACQUIRE_TIMEOUT_MS: &str = "SIMPLEBANK_ACQUIRE_TIMEOUT_MS";
const ENV_BUSY_TIMEOUT_MS: &str = "SIMPLEBANK_BUSY_TIMEOUT_MS";
const ENV_TX_TIMEOUT_MS: &str = "SIMPLEBANK_TX_TIMEOUT_MS";
const ENV_LOG_LEVEL: &str = "SIMPLEBANK_LOG_LEVEL";
const ENV_LOG_JSON: &str = "SIMPLEBANK_LOG_JSON";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection url, e.g. `sqlite:bank.db`
    pub url: String,
    pub max_connections: u32,
    /// How long a caller waits for a pooled connection before giving up
    pub acquire_timeout_ms: u64,
    /// How long SQLite waits for the write lock held by another transaction
    pub busy_timeout_ms: u64,
    /// Upper bound for a whole transaction (unit of work + commit)
    pub transaction_timeout_ms: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:simplebank.db".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5_000,
            busy_timeout_ms: 5_000,
            transaction_timeout_ms: None,
        }
    }
}

impl DatabaseConfig {
    /// Config for a SQLite file at `path`, everything else default.
    pub fn for_path(path: &str) -> Self {
        Self {
            url: format!("sqlite:{}", path),
            ..Self::default()
        }
    }

    /// Defaults overridden by `SIMPLEBANK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            config.url = url;
        }
        if let Some(v) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_value(ENV_MAX_CONNECTIONS, &v)?;
            if config.max_connections == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_MAX_CONNECTIONS,
                    value: v,
                });
            }
        }
        if let Some(v) = lookup(ENV_ACQUIRE_TIMEOUT_MS) {
            config.acquire_timeout_ms = parse_value(ENV_ACQUIRE_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_BUSY_TIMEOUT_MS) {
            config.busy_timeout_ms = parse_value(ENV_BUSY_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_TX_TIMEOUT_MS) {
            config.transaction_timeout_ms = Some(parse_value(ENV_TX_TIMEOUT_MS, &v)?);
        }
        Ok(config)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn transaction_timeout(&self) -> Option<Duration> {
        self.transaction_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set
    pub level: String,
    pub use_json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            use_json: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.level = level;
        }
        if let Some(v) = lookup(ENV_LOG_JSON) {
            config.use_json = parse_value(ENV_LOG_JSON, &v)?;
        }
        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
