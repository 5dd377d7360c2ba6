//! Error types for dbc.

use thiserror::Error;

/// Main error type for dbc operations.
#[derive(Error, Debug)]
pub enum DbcError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Core(#[from] dbc_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for DbcError {
    fn from(e: toml::de::Error) -> Self {
        DbcError::Config(e.to_string())
    }
}

/// Result type alias for dbc operations.
pub type DbcResult<T> = Result<T, DbcError>;
