//! Server configuration.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dbc_core::connection::SyncConfig;
use serde::Deserialize;

const DEFAULT_BIND: &str = "127.0.0.1:7070";

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Console home directory
    pub home: PathBuf,
    /// Path to configuration file
    pub config_path: PathBuf,
    /// Address the HTTP API listens on
    pub bind: String,
    /// Database path
    pub database_path: PathBuf,
    /// Debounce windows handed to connection form clients
    pub sync: SyncConfig,
}

/// Optional overrides read from `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind: Option<String>,
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dbconsole");
        Self::with_home(home)
    }
}

impl Config {
    fn with_home(home: PathBuf) -> Self {
        Self {
            config_path: home.join("config.toml"),
            database_path: home.join("console.db"),
            bind: DEFAULT_BIND.to_string(),
            sync: SyncConfig::default(),
            home,
        }
    }

    /// Load configuration from file, environment and defaults
    ///
    /// Standard directory structure:
    /// ```text
    /// ~/.dbconsole/
    /// ├── config.toml           # Optional overrides
    /// └── console.db            # Database
    /// ```
    ///
    /// `DBC_HOME` moves the directory; `DBC_BIND` and `DBC_DATABASE_PATH`
    /// take precedence over the file.
    pub fn load() -> anyhow::Result<Self> {
        let home = std::env::var("DBC_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Config::default().home);

        let mut config = Self::load_from_dir(&home)?;

        if let Ok(bind) = std::env::var("DBC_BIND") {
            config.bind = bind;
        }
        if let Ok(path) = std::env::var("DBC_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Load configuration rooted at `home`, creating the directory if needed.
    pub fn load_from_dir(home: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(home)
            .with_context(|| format!("Failed to create {}", home.display()))?;

        let mut config = Self::with_home(home.to_path_buf());
        if config.config_path.exists() {
            let text = std::fs::read_to_string(&config.config_path)?;
            let file: FileConfig = toml::from_str(&text)
                .with_context(|| format!("Invalid {}", config.config_path.display()))?;

            if let Some(bind) = file.bind {
                config.bind = bind;
            }
            if let Some(path) = file.database_path {
                config.database_path = if path.is_relative() { home.join(path) } else { path };
            }
            if let Some(sync) = file.sync {
                config.sync = sync;
            }
        }

        config.sync.validate()?;
        Ok(config)
    }
}
