//! Effective access decisions.
//!
//! Evaluation is a pure function of a [`PolicySnapshot`], the request and `now`.
//! Anything missing or malformed denies.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::condition::Condition;
use super::snapshot::{PolicySnapshot, ResourceRef, Subject};
use crate::masking::{MaskingParams, parse_args, transform};
use crate::types::{
    DataAccessPolicy, DataResource, MaskingType, PolicyEffect, PolicyException, ResourceLevel,
};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    /// No resource row covers the requested location.
    UnknownResource,
    /// No active policy matched the subject, privilege and resource.
    NoMatchingPolicy,
    PolicyAllow,
    PolicyDeny,
    /// An approved exception inside its window granted access.
    ExceptionOverride,
    /// The winning policy names a masking pattern that is missing or invalid.
    MaskingUnresolved,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::UnknownResource => "UNKNOWN_RESOURCE",
            DecisionReason::NoMatchingPolicy => "NO_MATCHING_POLICY",
            DecisionReason::PolicyAllow => "POLICY_ALLOW",
            DecisionReason::PolicyDeny => "POLICY_DENY",
            DecisionReason::ExceptionOverride => "EXCEPTION_OVERRIDE",
            DecisionReason::MaskingUnresolved => "MASKING_UNRESOLVED",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective access decision for one (subject, resource, privilege).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub masking_type: Option<MaskingType>,
    pub masking_args: Option<String>,
    pub policy_id: Option<String>,
    pub exception_id: Option<String>,
    pub reason: DecisionReason,
}

impl Decision {
    fn deny(reason: DecisionReason, policy_id: Option<String>) -> Self {
        Self {
            allowed: false,
            masking_type: None,
            masking_args: None,
            policy_id,
            exception_id: None,
            reason,
        }
    }

    /// Allowed and some masking other than NONE applies.
    pub fn is_masked(&self) -> bool {
        self.allowed && !matches!(self.masking_type, None | Some(MaskingType::None))
    }
}

/// Evaluate access for `subject` to `resource` with `privilege` at `now`.
pub fn evaluate(
    snapshot: &PolicySnapshot,
    subject: &Subject,
    resource: &ResourceRef,
    privilege: &str,
    now: DateTime<Utc>,
) -> Decision {
    evaluate_compiled(snapshot, subject, resource, privilege, now).0
}

fn evaluate_compiled(
    snapshot: &PolicySnapshot,
    subject: &Subject,
    resource: &ResourceRef,
    privilege: &str,
    now: DateTime<Utc>,
) -> (Decision, Option<MaskingParams>) {
    let chain = snapshot.resource_chain(resource);
    if chain.is_empty() {
        warn!(?resource, privilege, "Access denied: resource is not registered");
        return (Decision::deny(DecisionReason::UnknownResource, None), None);
    }
    let levels: HashMap<&str, ResourceLevel> =
        chain.iter().map(|r| (r.id.as_str(), r.level())).collect();

    let subjects = snapshot.expand_subject(subject);
    let winner = select_policy(snapshot, &subjects, &levels, privilege, &now);
    let policy_id = winner.map(|p| p.id.clone());

    if let Some(exception) = select_exception(snapshot, &subjects, &chain, privilege, &now) {
        debug!(exception_id = %exception.id, privilege, "Access granted by policy exception");
        let decision = Decision {
            allowed: true,
            masking_type: None,
            masking_args: None,
            policy_id,
            exception_id: Some(exception.id.clone()),
            reason: DecisionReason::ExceptionOverride,
        };
        return (decision, None);
    }

    let Some(policy) = winner else {
        debug!(subject = %subject.id, privilege, "Access denied: no matching policy");
        return (Decision::deny(DecisionReason::NoMatchingPolicy, None), None);
    };

    if policy.effect == PolicyEffect::Deny {
        return (Decision::deny(DecisionReason::PolicyDeny, policy_id), None);
    }

    let Some(pattern_id) = policy.masking_policy_id.as_deref() else {
        let decision = Decision {
            allowed: true,
            masking_type: None,
            masking_args: None,
            policy_id,
            exception_id: None,
            reason: DecisionReason::PolicyAllow,
        };
        return (decision, None);
    };

    let Some(pattern) = snapshot.masking_pattern(pattern_id) else {
        warn!(policy_id = %policy.id, pattern_id, "Access denied: masking pattern not found");
        return (Decision::deny(DecisionReason::MaskingUnresolved, policy_id), None);
    };

    match parse_args(pattern.masking_type, pattern.masking_args.as_deref()) {
        Ok(params) => {
            let decision = Decision {
                allowed: true,
                masking_type: Some(pattern.masking_type),
                masking_args: pattern.masking_args.clone(),
                policy_id,
                exception_id: None,
                reason: DecisionReason::PolicyAllow,
            };
            (decision, Some(params))
        }
        Err(e) => {
            warn!(policy_id = %policy.id, pattern_id, error = %e, "Access denied: masking pattern is invalid");
            (Decision::deny(DecisionReason::MaskingUnresolved, policy_id), None)
        }
    }
}

/// Pick the single effective policy: priority, then specificity, then recency.
fn select_policy<'a>(
    snapshot: &'a PolicySnapshot,
    subjects: &[Subject],
    levels: &HashMap<&str, ResourceLevel>,
    privilege: &str,
    now: &DateTime<Utc>,
) -> Option<&'a DataAccessPolicy> {
    subjects
        .iter()
        .flat_map(|s| snapshot.policies_for(s, privilege))
        .filter(|p| p.is_active)
        .filter_map(|p| {
            let level = match p.resource_id.as_deref() {
                None => ResourceLevel::Global,
                Some(id) => *levels.get(id)?,
            };
            condition_holds(p, now).then_some((p, level))
        })
        .max_by_key(|(p, level)| (p.priority, *level, p.created_at, Reverse(p.id.as_str())))
        .map(|(p, _)| p)
}

fn condition_holds(policy: &DataAccessPolicy, now: &DateTime<Utc>) -> bool {
    let Some(text) = policy.environment_condition.as_deref() else {
        return true;
    };
    match Condition::parse(text) {
        Ok(condition) => condition.holds_at(now),
        Err(e) => {
            warn!(policy_id = %policy.id, error = %e, "Ignoring policy with unparseable environment condition");
            false
        }
    }
}

/// Active exception that overrides `privilege`; the latest-starting one wins.
fn select_exception<'a>(
    snapshot: &'a PolicySnapshot,
    subjects: &[Subject],
    chain: &[&DataResource],
    privilege: &str,
    now: &DateTime<Utc>,
) -> Option<&'a PolicyException> {
    let in_chain: HashSet<&str> = chain.iter().map(|r| r.id.as_str()).collect();
    subjects
        .iter()
        .flat_map(|s| snapshot.exceptions_for(s))
        .filter(|e| e.override_privilege == privilege && e.is_active_at(now))
        .filter(|e| match e.resource_id.as_deref() {
            None => true,
            Some(id) => in_chain.contains(id),
        })
        .max_by_key(|e| (e.start_time, e.created_at, Reverse(e.id.as_str())))
}

// ─────────────────────────────────────────────────────────────────────────────
// Result sets
// ─────────────────────────────────────────────────────────────────────────────

/// Decision for one result column.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    pub name: String,
    pub decision: Decision,
    params: Option<MaskingParams>,
}

/// Per-column decisions for a result set.
#[derive(Debug, Clone)]
pub struct MaskingPlan {
    columns: Vec<ColumnPlan>,
}

impl MaskingPlan {
    pub fn columns(&self) -> &[ColumnPlan] {
        &self.columns
    }

    /// Names of the columns that survive masking, in order.
    pub fn visible_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.decision.allowed)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Apply the plan to one row.
    ///
    /// Denied columns are dropped; SQL NULLs stay NULL. A row shorter than the
    /// plan is treated as having NULLs in the missing positions.
    pub fn apply_row(&self, row: &[Option<String>], session_key: &str) -> Vec<Option<String>> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.decision.allowed)
            .map(|(idx, column)| {
                let value = row.get(idx).cloned().flatten()?;
                match &column.params {
                    Some(params) => transform::apply(&value, params, session_key),
                    None => Some(value),
                }
            })
            .collect()
    }
}

/// Evaluate every column of a result set read from `table`.
pub fn evaluate_columns(
    snapshot: &PolicySnapshot,
    subject: &Subject,
    table: &ResourceRef,
    columns: &[&str],
    privilege: &str,
    now: DateTime<Utc>,
) -> MaskingPlan {
    let columns = columns
        .iter()
        .map(|name| {
            let (decision, params) =
                evaluate_compiled(snapshot, subject, &table.with_column(*name), privilege, now);
            ColumnPlan {
                name: name.to_string(),
                decision,
                params,
            }
        })
        .collect();
    MaskingPlan { columns }
}
