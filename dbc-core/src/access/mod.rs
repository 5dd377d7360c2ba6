//! Data access policy evaluation.
//!
//! - **snapshot**: immutable arena of resources, roles, policies and exceptions
//! - **evaluator**: effective decision for a subject, resource and privilege
//! - **condition**: environment conditions on policies
//! - **exception**: exception lifecycle rules

pub mod condition;
pub mod evaluator;
pub mod exception;
pub mod snapshot;

pub use condition::Condition;
pub use evaluator::{ColumnPlan, Decision, DecisionReason, MaskingPlan, evaluate, evaluate_columns};
pub use exception::{EffectiveStatus, next_status, validate_request};
pub use snapshot::{PolicySnapshot, ResourceRef, SnapshotData, Subject};
