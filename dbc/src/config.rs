//! Configuration management for dbc.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (DBC_*)
//! 2. Config file (~/.dbconsole/cli.toml)
//! 3. Default values

use std::path::{Path, PathBuf};

use dbc_core::Database;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DbcError, DbcResult};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Console database shared with dbc-server
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// User recorded as the actor on exception approvals
    #[serde(default = "default_user")]
    pub user: String,
}

fn home_dir() -> PathBuf {
    if let Ok(home) = std::env::var("DBC_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dbconsole")
}

fn default_database_path() -> PathBuf {
    home_dir().join("console.db")
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "cli".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            user: default_user(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> DbcResult<Self> {
        let mut config = Self::load_from(&Self::config_path())?;

        if let Ok(path) = std::env::var("DBC_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(user) = std::env::var("DBC_USER") {
            config.user = user;
        }
        debug!(database = %config.database_path.display(), user = %config.user, "Loaded configuration");
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> DbcResult<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.user.trim().is_empty() {
            return Err(DbcError::Config("user must not be empty".into()));
        }
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DBC_CONFIG") {
            PathBuf::from(path)
        } else {
            home_dir().join("cli.toml")
        }
    }

    /// Open (creating if needed) the console database.
    pub fn open_database(&self) -> DbcResult<Database> {
        Ok(Database::open(&self.database_path)?)
    }
}
