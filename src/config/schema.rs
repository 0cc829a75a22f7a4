//! Configuration data structures for cpg-serve.
//!
//! Every field has a serde default, so a YAML file only needs to name the
//! values it changes.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::db::pool::PoolOptions;
use crate::error::{CpgError, Result};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl ServeConfig {
    /// Reject values that would only fail later, at startup.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(CpgError::Config("database.pool_size must be at least 1".into()));
        }
        if self.database.acquire_timeout_ms == 0 {
            return Err(CpgError::Config(
                "database.acquire_timeout_ms must be at least 1".into(),
            ));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.server
            .addr
            .parse()
            .map_err(|e| CpgError::Config(format!("server.addr {:?}: {e}", self.server.addr)))
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            size: self.database.pool_size,
            acquire_timeout: Duration::from_millis(self.database.acquire_timeout_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// CPG database produced by the extraction pipeline.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Read-only connections opened at startup.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long a request waits for a free connection.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Value of the `Access-Control-Allow-Origin` response header.
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            allow_origin: default_allow_origin(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cpg.db")
}

fn default_pool_size() -> usize {
    2
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_allow_origin() -> String {
    "*".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
