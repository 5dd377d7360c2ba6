//! Immutable, indexed view of everything policy evaluation reads.
//!
//! A snapshot is built once (usually by `Database::load_policy_snapshot`) and
//! shared behind an `Arc`; evaluation never takes a lock.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{
    DataAccessPolicy, DataResource, MaskingPattern, PolicyException, Role, SubjectType, UserRole,
};

/// Raw rows a snapshot is built from.
#[derive(Debug, Clone, Default)]
pub struct SnapshotData {
    pub resources: Vec<DataResource>,
    pub roles: Vec<Role>,
    pub user_roles: Vec<UserRole>,
    pub policies: Vec<DataAccessPolicy>,
    pub exceptions: Vec<PolicyException>,
    pub masking_patterns: Vec<MaskingPattern>,
}

/// Location of a column, table or database being accessed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub database_id: String,
    pub schema_name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
}

impl ResourceRef {
    pub fn column(
        database_id: impl Into<String>,
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            schema_name: schema_name.into(),
            table_name: Some(table_name.into()),
            column_name: Some(column_name.into()),
        }
    }

    pub fn table(
        database_id: impl Into<String>,
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            database_id: database_id.into(),
            schema_name: schema_name.into(),
            table_name: Some(table_name.into()),
            column_name: None,
        }
    }

    pub fn database(database_id: impl Into<String>, schema_name: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            schema_name: schema_name.into(),
            table_name: None,
            column_name: None,
        }
    }

    /// Same location with the column replaced.
    pub fn with_column(&self, column_name: impl Into<String>) -> Self {
        Self {
            column_name: Some(column_name.into()),
            ..self.clone()
        }
    }
}

/// The user or role a request is evaluated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(rename = "type")]
    pub subject_type: SubjectType,
    pub id: String,
}

impl Subject {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            subject_type: SubjectType::User,
            id: id.into(),
        }
    }

    pub fn role(id: impl Into<String>) -> Self {
        Self {
            subject_type: SubjectType::Role,
            id: id.into(),
        }
    }
}

type LocationKey = (String, String, Option<String>, Option<String>);

fn location_key(resource: &DataResource) -> LocationKey {
    (
        resource.database_id.clone(),
        resource.schema_name.clone(),
        resource.table_name.clone(),
        resource.column_name.clone(),
    )
}

#[derive(Debug, Default)]
pub struct PolicySnapshot {
    resources: Vec<DataResource>,
    resources_by_id: HashMap<String, usize>,
    resources_by_location: HashMap<LocationKey, Vec<usize>>,
    roles: HashMap<String, Role>,
    user_roles: HashMap<String, Vec<String>>,
    policies: Vec<DataAccessPolicy>,
    policies_by_subject: HashMap<(SubjectType, String, String), Vec<usize>>,
    exceptions: Vec<PolicyException>,
    exceptions_by_subject: HashMap<(SubjectType, String), Vec<usize>>,
    masking_patterns: HashMap<String, MaskingPattern>,
}

impl PolicySnapshot {
    pub fn new(data: SnapshotData) -> Self {
        let mut snapshot = Self::default();

        for (idx, resource) in data.resources.into_iter().enumerate() {
            snapshot.resources_by_id.insert(resource.id.clone(), idx);
            snapshot
                .resources_by_location
                .entry(location_key(&resource))
                .or_default()
                .push(idx);
            snapshot.resources.push(resource);
        }

        snapshot.roles = data.roles.into_iter().map(|r| (r.id.clone(), r)).collect();
        for assignment in data.user_roles {
            snapshot
                .user_roles
                .entry(assignment.user_id)
                .or_default()
                .push(assignment.role_id);
        }

        for (idx, policy) in data.policies.into_iter().enumerate() {
            snapshot
                .policies_by_subject
                .entry((
                    policy.subject_type,
                    policy.subject_id.clone(),
                    policy.privilege_code.clone(),
                ))
                .or_default()
                .push(idx);
            snapshot.policies.push(policy);
        }

        for (idx, exception) in data.exceptions.into_iter().enumerate() {
            snapshot
                .exceptions_by_subject
                .entry((exception.subject_type, exception.subject_id.clone()))
                .or_default()
                .push(idx);
            snapshot.exceptions.push(exception);
        }

        snapshot.masking_patterns = data
            .masking_patterns
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        snapshot
    }

    pub fn resource(&self, id: &str) -> Option<&DataResource> {
        self.resources_by_id.get(id).map(|&idx| &self.resources[idx])
    }

    pub fn resources(&self) -> &[DataResource] {
        &self.resources
    }

    pub fn masking_pattern(&self, id: &str) -> Option<&MaskingPattern> {
        self.masking_patterns.get(id)
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Resource rows covering `target`, most specific first: the exact column,
    /// then its table, then its database.
    pub fn resource_chain(&self, target: &ResourceRef) -> Vec<&DataResource> {
        let db = &target.database_id;
        let schema = &target.schema_name;
        let mut keys: Vec<LocationKey> = Vec::with_capacity(3);

        if let Some(table) = &target.table_name {
            if let Some(column) = &target.column_name {
                keys.push((db.clone(), schema.clone(), Some(table.clone()), Some(column.clone())));
            }
            keys.push((db.clone(), schema.clone(), Some(table.clone()), None));
        }
        keys.push((db.clone(), schema.clone(), None, None));

        keys.iter()
            .filter_map(|key| self.resources_by_location.get(key))
            .flatten()
            .map(|&idx| &self.resources[idx])
            .collect()
    }

    /// Role ids assigned directly to a user.
    pub fn roles_of_user(&self, user_id: &str) -> &[String] {
        self.user_roles
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `role_id` followed by its ancestors, nearest first.
    ///
    /// Walking stops at the first role seen twice; the cycle is logged.
    pub fn role_lineage(&self, role_id: &str) -> Vec<String> {
        let mut lineage = vec![role_id.to_string()];
        let mut seen: HashSet<&str> = HashSet::from([role_id]);
        let mut current = self.roles.get(role_id);

        while let Some(parent_id) = current.and_then(|r| r.parent_id.as_deref()) {
            if !seen.insert(parent_id) {
                warn!(role_id, parent_id, "Role hierarchy cycle detected, stopping ancestor walk");
                break;
            }
            lineage.push(parent_id.to_string());
            current = self.roles.get(parent_id);
        }

        lineage
    }

    /// Every subject whose grants apply to `subject`: itself, then its roles
    /// and their ancestors. No duplicates.
    pub fn expand_subject(&self, subject: &Subject) -> Vec<Subject> {
        let mut expanded = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |s: Subject, expanded: &mut Vec<Subject>| {
            if seen.insert(s.clone()) {
                expanded.push(s);
            }
        };

        let roots: Vec<String> = match subject.subject_type {
            SubjectType::User => {
                push(subject.clone(), &mut expanded);
                self.roles_of_user(&subject.id).to_vec()
            }
            SubjectType::Role => vec![subject.id.clone()],
        };

        for root in roots {
            for role_id in self.role_lineage(&root) {
                push(Subject::role(role_id), &mut expanded);
            }
        }

        expanded
    }

    /// Policies granted directly to `subject` for `privilege`, active or not.
    pub fn policies_for<'a>(
        &'a self,
        subject: &Subject,
        privilege: &str,
    ) -> impl Iterator<Item = &'a DataAccessPolicy> + 'a {
        self.policies_by_subject
            .get(&(subject.subject_type, subject.id.clone(), privilege.to_string()))
            .into_iter()
            .flatten()
            .map(|&idx| &self.policies[idx])
    }

    /// Exceptions granted directly to `subject`, any status.
    pub fn exceptions_for<'a>(
        &'a self,
        subject: &Subject,
    ) -> impl Iterator<Item = &'a PolicyException> + 'a {
        self.exceptions_by_subject
            .get(&(subject.subject_type, subject.id.clone()))
            .into_iter()
            .flatten()
            .map(|&idx| &self.exceptions[idx])
    }
}
