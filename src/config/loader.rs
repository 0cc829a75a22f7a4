//! Layered configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. user config (`<config dir>/cpg-serve/config.yaml`)
//! 3. project config (`.cpg-serve.yaml` in the project root)
//! 4. an explicit `--config` file
//! 5. `CPG_SERVE_DB`, `CPG_SERVE_ADDR`, `CPG_SERVE_POOL_SIZE`
//! 6. command-line flags ([`ConfigOverrides`])
//!
//! YAML layers are merged key by key, so a file that only sets
//! `server.addr` leaves the database section from lower layers intact.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::config::schema::ServeConfig;
use crate::error::{CpgError, Result};

pub const PROJECT_CONFIG_FILE: &str = ".cpg-serve.yaml";
pub const USER_CONFIG_FILE: &str = "config.yaml";

pub const ENV_DB: &str = "CPG_SERVE_DB";
pub const ENV_ADDR: &str = "CPG_SERVE_ADDR";
pub const ENV_POOL_SIZE: &str = "CPG_SERVE_POOL_SIZE";

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db: Option<PathBuf>,
    pub addr: Option<String>,
    pub pool_size: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ServeConfig) {
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
        if let Some(addr) = &self.addr {
            config.server.addr = addr.clone();
        }
        if let Some(size) = self.pool_size {
            config.database.pool_size = size;
        }
    }
}

/// Load the full layered configuration from the real environment.
pub fn load_config(
    explicit: Option<&Path>,
    project_root: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ServeConfig> {
    let mut files = Vec::new();
    if let Some(user) = user_config_path() {
        files.push(user);
    }
    if let Some(root) = project_root {
        files.push(root.join(PROJECT_CONFIG_FILE));
    }

    let mut config = merge_files(&files, explicit)?;
    apply_env(&mut config, |key| std::env::var(key).ok())?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "cpg-serve")
        .map(|dirs| dirs.config_dir().join(USER_CONFIG_FILE))
}

/// Merge optional `files` (missing ones are skipped) and then the
/// `explicit` file, which must exist.
pub fn merge_files(files: &[PathBuf], explicit: Option<&Path>) -> Result<ServeConfig> {
    let mut merged = Value::Mapping(Mapping::new());
    for path in files {
        if path.is_file() {
            tracing::debug!("loading config layer {}", path.display());
            merge_yaml(&mut merged, read_yaml(path)?);
        }
    }
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(CpgError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        merge_yaml(&mut merged, read_yaml(path)?);
    }
    Ok(serde_yaml::from_value(merged)?)
}

fn read_yaml(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    Ok(serde_yaml::from_str(&text)?)
}

/// Recursively overlay `overlay` onto `base`. Mappings merge; anything
/// else replaces.
fn merge_yaml(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_yaml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Apply environment overrides read through `lookup`.
pub fn apply_env<F>(config: &mut ServeConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(db) = lookup(ENV_DB).filter(|v| !v.is_empty()) {
        config.database.path = PathBuf::from(db);
    }
    if let Some(addr) = lookup(ENV_ADDR).filter(|v| !v.is_empty()) {
        config.server.addr = addr;
    }
    if let Some(size) = lookup(ENV_POOL_SIZE).filter(|v| !v.is_empty()) {
        config.database.pool_size = size
            .trim()
            .parse()
            .map_err(|_| CpgError::Config(format!("{ENV_POOL_SIZE} must be an integer, got {size:?}")))?;
    }
    Ok(())
}
