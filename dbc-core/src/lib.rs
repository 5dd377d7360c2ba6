//! dbc-core - Core library for the database console
//!
//! Shared between the `dbc` CLI and `dbc-server`:
//!
//! - **connection**: URI parsing/building and the form/URI sync engine
//! - **access**: Policy snapshots and the access decision evaluator
//! - **masking**: Masking arguments, transforms and the pattern registry
//! - **db**: SQLite storage for console data
//! - **realtime**: Event connection with listener subscriptions

pub mod access;
pub mod connection;
#[cfg(feature = "db")]
pub mod db;
pub mod error;
pub mod masking;
pub mod realtime;
pub mod types;

// Re-export commonly used types
#[cfg(feature = "db")]
pub use db::Database;
pub use error::{Error, Result};
