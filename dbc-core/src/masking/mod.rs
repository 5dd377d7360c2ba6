//! Masking patterns: argument validation, value transforms and the registry.

pub mod args;
#[cfg(feature = "db")]
pub mod registry;
pub mod transform;

pub use args::{MaskingParams, PartialFill, parse_args, validate_args};
#[cfg(feature = "db")]
pub use registry::MaskingRegistry;
