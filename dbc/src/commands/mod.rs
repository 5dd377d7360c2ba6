//! Command implementations for dbc CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod doctor;
pub mod evaluate;
pub mod exception;
pub mod pattern;
pub mod uri;
