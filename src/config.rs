//! Runtime configuration.
//!
//! Defaults are usable as-is. A TOML file can override any of them, and a
//! few fields can be overridden again from the command line or environment.
//!
//! ```toml
//! env = "prod"
//!
//! [storage]
//! path = "/var/lib/payledger/ledger.db"
//!
//! [http_server]
//! address = "0.0.0.0:8080"
//! timeout_secs = 4
//!
//! [seed]
//! wallet_count = 10
//! initial_balance = 100.0
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{units, Cents, CENTS_PER_UNIT};

/// Deployment environment; selects the log format and level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Human-readable logs at debug level
    #[default]
    Local,
    /// JSON logs at debug level
    Dev,
    /// JSON logs at info level
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Dev => write!(f, "dev"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: Environment,
    pub storage: StorageConfig,
    pub http_server: HttpServerConfig,
    pub seed: SeedConfig,
}

/// SQLite storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file, created on first start.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_secs: u64,
    /// How long a caller waits for a pooled connection.
    pub acquire_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("payledger.db"),
            max_connections: 8,
            busy_timeout_secs: 5,
            acquire_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Listen address (host:port).
    pub address: String,
    /// Per-request deadline.
    pub timeout_secs: u64,
    /// Grace period for in-flight requests on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            timeout_secs: 4,
            shutdown_timeout_secs: 10,
        }
    }
}

impl HttpServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Wallets created when the store starts with none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub wallet_count: usize,
    /// Opening balance of each seeded wallet, in units.
    #[serde(with = "units")]
    pub initial_balance: Cents,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            wallet_count: 10,
            initial_balance: 100 * CENTS_PER_UNIT,
        }
    }
}

impl Config {
    /// Read a TOML config file. Fields it omits keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.max_connections == 0 {
            bail!("storage.max_connections must be at least 1");
        }
        if self.storage.acquire_timeout_secs == 0 {
            bail!("storage.acquire_timeout_secs must be greater than zero");
        }
        if self.http_server.timeout_secs == 0 {
            bail!("http_server.timeout_secs must be greater than zero");
        }
        if self.http_server.shutdown_timeout_secs == 0 {
            bail!("http_server.shutdown_timeout_secs must be greater than zero");
        }
        if self.seed.wallet_count == 0 {
            bail!("seed.wallet_count must be at least 1");
        }
        if self.seed.initial_balance < 0 {
            bail!("seed.initial_balance must not be negative");
        }
        Ok(())
    }
}
