//! Configuration for the postgres lifecycle service and its host binary.
//!
//! Resolution order (later wins):
//! - built-in defaults
//! - `config.toml` in the working directory, if present
//! - environment: `POSTGRES_*` for the connection, `SCRIPTS_*` for startup
//!   SQL, `LOGLEVEL` / `LISTEN_ADDR` for the host
//!
//! The library never reads this on its own; callers resolve a [`Config`]
//! once and hand the [`PostgresConfig`] to the service.

use crate::error::ServiceError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgSslMode;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub postgres: PostgresConfig,
    pub scripts: ScriptsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub loglevel: String,
    pub listen_addr: String,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            loglevel: "info".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Connection settings. Immutable for the duration of one start cycle.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Number of connection attempts; `0` still makes one attempt.
    pub max_retries: u32,
    /// Seconds to sleep between attempts.
    pub retry_interval: u64,
    pub ssl_mode: String,
    pub max_connections: u32,
    /// Seconds to wait for a single connection attempt or health probe.
    pub connect_timeout: u64,
    /// Upper bound in seconds for the whole start sequence.
    pub startup_timeout: Option<u64>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            max_retries: 10,
            retry_interval: 6,
            ssl_mode: "disable".to_string(),
            max_connections: 5,
            connect_timeout: 5,
            startup_timeout: None,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_retries", &self.max_retries)
            .field("retry_interval", &self.retry_interval)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

impl PostgresConfig {
    /// Total connection attempts made by one start.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn startup_timeout(&self) -> Option<Duration> {
        self.startup_timeout.map(Duration::from_secs)
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn retry_budget(&self) -> Duration {
        self.retry_interval() * (self.max_attempts() - 1)
    }

    pub fn ssl_mode(&self) -> Result<PgSslMode, ServiceError> {
        PgSslMode::from_str(&self.ssl_mode)
            .map_err(|_| ServiceError::InvalidConfig(format!("unknown ssl_mode {:?}", self.ssl_mode)))
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.port == 0 {
            return Err(ServiceError::InvalidConfig(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("host must not be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        self.ssl_mode()?;
        Ok(())
    }
}

/// Where the startup SQL comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    pub setup_path: Option<PathBuf>,
    pub update_path: Option<PathBuf>,
    /// Must select exactly one integer column.
    pub revision_sql: Option<String>,
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(section_env("POSTGRES_", "postgres"))
            .merge(section_env("SCRIPTS_", "scripts"))
            .merge(
                Env::raw()
                    .only(&["loglevel", "listen_addr"])
                    .map(|key| format!("basic.{}", key.as_str().to_ascii_lowercase()).into()),
            )
    }

    /// Resolve and validate the configuration.
    pub fn load() -> Result<Self, ServiceError> {
        let cfg: Config = Self::figment().extract()?;
        cfg.postgres.validate()?;
        Ok(cfg)
    }
}

fn section_env(prefix: &'static str, section: &'static str) -> Env {
    Env::prefixed(prefix)
        .map(move |key| format!("{section}.{}", key.as_str().to_ascii_lowercase()).into())
}
