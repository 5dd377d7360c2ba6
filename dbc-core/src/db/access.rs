//! Resources, roles, policies, access audits and policy snapshots.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use super::{Database, get_enum, get_time, new_id, now, to_millis};
use crate::access::{Condition, PolicySnapshot, SnapshotData};
use crate::error::{Error, Result};
use crate::types::{
    AccessAudit, DataAccessPolicy, DataResource, NewAccessAudit, NewDataAccessPolicy,
    NewDataResource, NewRole, Role, UserRole,
};

const RESOURCE_COLUMNS: &str =
    "id, database_id, schema_name, table_name, column_name, sensitivity, description, created_at";

const POLICY_COLUMNS: &str = "id, name, subject_type, subject_id, privilege_code, effect, resource_id,
        masking_policy_id, environment_condition, priority, is_active, created_at";

impl Database {
    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_resource(&self, input: &NewDataResource) -> Result<DataResource> {
        let blank = |s: &Option<String>| s.as_deref().is_some_and(|v| v.trim().is_empty());
        if input.database_id.trim().is_empty() || input.schema_name.trim().is_empty() {
            return Err(Error::validation("Resource databaseId and schemaName are required"));
        }
        if blank(&input.table_name) || blank(&input.column_name) {
            return Err(Error::validation("Resource tableName and columnName must not be blank"));
        }
        if input.column_name.is_some() && input.table_name.is_none() {
            return Err(Error::validation("A column resource requires a tableName"));
        }

        let conn = self.lock()?;
        let resource = DataResource {
            id: new_id(),
            database_id: input.database_id.clone(),
            schema_name: input.schema_name.clone(),
            table_name: input.table_name.clone(),
            column_name: input.column_name.clone(),
            sensitivity: input.sensitivity,
            description: input.description.clone(),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO data_resource
             (id, database_id, schema_name, table_name, column_name, sensitivity, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                resource.id,
                resource.database_id,
                resource.schema_name,
                resource.table_name,
                resource.column_name,
                resource.sensitivity.as_str(),
                resource.description,
                to_millis(&resource.created_at),
            ],
        )?;

        info!(id = %resource.id, level = ?resource.level(), "Registered data resource");
        Ok(resource)
    }

    pub fn list_resources(&self) -> Result<Vec<DataResource>> {
        let conn = self.lock()?;
        Self::query_resources(&conn)
    }

    pub fn get_resource(&self, id: &str) -> Result<Option<DataResource>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM data_resource WHERE id = ?1"
        ))?;
        Ok(stmt.query_row(params![id], Self::map_resource).optional()?)
    }

    fn query_resources(conn: &Connection) -> Result<Vec<DataResource>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM data_resource
             ORDER BY database_id, schema_name, table_name, column_name"
        ))?;
        let resources = stmt
            .query_map([], Self::map_resource)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(resources)
    }

    fn map_resource(row: &rusqlite::Row) -> rusqlite::Result<DataResource> {
        Ok(DataResource {
            id: row.get(0)?,
            database_id: row.get(1)?,
            schema_name: row.get(2)?,
            table_name: row.get(3)?,
            column_name: row.get(4)?,
            sensitivity: get_enum(row, 5)?,
            description: row.get(6)?,
            created_at: get_time(row, 7)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Role Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_role(&self, input: &NewRole) -> Result<Role> {
        if input.name.trim().is_empty() {
            return Err(Error::validation("Role name is required"));
        }

        let conn = self.lock()?;
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM role WHERE name = ?1)",
            params![input.name],
            |row| row.get(0),
        )?;
        if taken {
            return Err(Error::conflict(format!("Role '{}' already exists", input.name)));
        }
        if let Some(parent_id) = &input.parent_id {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM role WHERE id = ?1)",
                params![parent_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::not_found("Role", parent_id));
            }
        }

        let role = Role {
            id: new_id(),
            name: input.name.clone(),
            parent_id: input.parent_id.clone(),
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO role (id, name, parent_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![role.id, role.name, role.parent_id, to_millis(&role.created_at)],
        )?;

        info!(id = %role.id, name = %role.name, "Created role");
        Ok(role)
    }

    pub fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.lock()?;
        Self::query_roles(&conn)
    }

    fn query_roles(conn: &Connection) -> Result<Vec<Role>> {
        let mut stmt = conn.prepare("SELECT id, name, parent_id, created_at FROM role ORDER BY name")?;
        let roles = stmt
            .query_map([], |row| {
                Ok(Role {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    parent_id: row.get(2)?,
                    created_at: get_time(row, 3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(roles)
    }

    /// Assign a user to a role. Assigning twice is a no-op.
    pub fn add_user_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM role WHERE id = ?1)",
            params![role_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::not_found("Role", role_id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO user_role (user_id, role_id) VALUES (?1, ?2)",
            params![user_id, role_id],
        )?;
        debug!(user_id, role_id, "Assigned role");
        Ok(())
    }

    pub fn remove_user_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM user_role WHERE user_id = ?1 AND role_id = ?2",
            params![user_id, role_id],
        )?;
        Ok(())
    }

    pub fn list_user_roles(&self) -> Result<Vec<UserRole>> {
        let conn = self.lock()?;
        Self::query_user_roles(&conn)
    }

    fn query_user_roles(conn: &Connection) -> Result<Vec<UserRole>> {
        let mut stmt = conn.prepare("SELECT user_id, role_id FROM user_role ORDER BY user_id, role_id")?;
        let assignments = stmt
            .query_map([], |row| {
                Ok(UserRole {
                    user_id: row.get(0)?,
                    role_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Policy Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a policy after checking its references and condition.
    pub fn create_policy(&self, input: &NewDataAccessPolicy) -> Result<DataAccessPolicy> {
        if input.name.trim().is_empty() {
            return Err(Error::validation("Policy name is required"));
        }
        if input.subject_id.trim().is_empty() || input.privilege_code.trim().is_empty() {
            return Err(Error::validation("Policy subjectId and privilegeCode are required"));
        }
        if let Some(condition) = &input.environment_condition {
            Condition::parse(condition)?;
        }

        let conn = self.lock()?;
        if let Some(resource_id) = &input.resource_id {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM data_resource WHERE id = ?1)",
                params![resource_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::not_found("DataResource", resource_id));
            }
        }
        if let Some(pattern_id) = &input.masking_policy_id {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM masking_pattern WHERE id = ?1)",
                params![pattern_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::not_found("MaskingPattern", pattern_id));
            }
        }

        let policy = DataAccessPolicy {
            id: new_id(),
            name: input.name.clone(),
            subject_type: input.subject_type,
            subject_id: input.subject_id.clone(),
            privilege_code: input.privilege_code.clone(),
            effect: input.effect,
            resource_id: input.resource_id.clone(),
            masking_policy_id: input.masking_policy_id.clone(),
            environment_condition: input
                .environment_condition
                .clone()
                .filter(|c| !c.trim().is_empty()),
            priority: input.priority,
            is_active: input.is_active,
            created_at: now(),
        };
        conn.execute(
            "INSERT INTO data_access_policy
             (id, name, subject_type, subject_id, privilege_code, effect, resource_id,
              masking_policy_id, environment_condition, priority, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                policy.id,
                policy.name,
                policy.subject_type.as_str(),
                policy.subject_id,
                policy.privilege_code,
                policy.effect.as_str(),
                policy.resource_id,
                policy.masking_policy_id,
                policy.environment_condition,
                policy.priority,
                policy.is_active,
                to_millis(&policy.created_at),
            ],
        )?;

        info!(
            id = %policy.id,
            subject = %policy.subject_id,
            privilege = %policy.privilege_code,
            effect = %policy.effect,
            "Created data access policy"
        );
        Ok(policy)
    }

    pub fn list_policies(&self) -> Result<Vec<DataAccessPolicy>> {
        let conn = self.lock()?;
        Self::query_policies(&conn)
    }

    pub fn get_policy(&self, id: &str) -> Result<Option<DataAccessPolicy>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POLICY_COLUMNS} FROM data_access_policy WHERE id = ?1"
        ))?;
        Ok(stmt.query_row(params![id], Self::map_policy).optional()?)
    }

    /// Switch a policy on or off. Activation is refused while the policy
    /// points at a masking pattern that no longer exists.
    pub fn set_policy_active(&self, id: &str, is_active: bool) -> Result<()> {
        let conn = self.lock()?;
        if is_active {
            let masking_policy_id: Option<String> = conn
                .query_row(
                    "SELECT masking_policy_id FROM data_access_policy WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| Error::not_found("DataAccessPolicy", id))?;
            if let Some(pattern_id) = masking_policy_id {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM masking_pattern WHERE id = ?1)",
                    params![pattern_id],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(Error::conflict(format!(
                        "Policy {} references deleted masking pattern {}",
                        id, pattern_id
                    )));
                }
            }
        }
        let changed = conn.execute(
            "UPDATE data_access_policy SET is_active = ?1 WHERE id = ?2",
            params![is_active, id],
        )?;
        if changed == 0 {
            return Err(Error::not_found("DataAccessPolicy", id));
        }
        Ok(())
    }

    pub fn delete_policy(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM data_access_policy WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(Error::not_found("DataAccessPolicy", id));
        }
        info!(id, "Deleted data access policy");
        Ok(())
    }

    fn query_policies(conn: &Connection) -> Result<Vec<DataAccessPolicy>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {POLICY_COLUMNS} FROM data_access_policy ORDER BY priority DESC, created_at DESC"
        ))?;
        let policies = stmt
            .query_map([], Self::map_policy)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(policies)
    }

    fn map_policy(row: &rusqlite::Row) -> rusqlite::Result<DataAccessPolicy> {
        Ok(DataAccessPolicy {
            id: row.get(0)?,
            name: row.get(1)?,
            subject_type: get_enum(row, 2)?,
            subject_id: row.get(3)?,
            privilege_code: row.get(4)?,
            effect: get_enum(row, 5)?,
            resource_id: row.get(6)?,
            masking_policy_id: row.get(7)?,
            environment_condition: row.get(8)?,
            priority: row.get(9)?,
            is_active: row.get(10)?,
            created_at: get_time(row, 11)?,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access Audit Operations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn record_access(&self, input: &NewAccessAudit) -> Result<AccessAudit> {
        let conn = self.lock()?;
        let audit = AccessAudit {
            id: new_id(),
            user_id: input.user_id.clone(),
            privilege: input.privilege.clone(),
            resource_id: input.resource_id.clone(),
            allowed: input.allowed,
            policy_id: input.policy_id.clone(),
            exception_id: input.exception_id.clone(),
            reason: input.reason.clone(),
            timestamp: now(),
        };
        conn.execute(
            "INSERT INTO access_audit
             (id, user_id, privilege, resource_id, allowed, policy_id, exception_id, reason, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                audit.id,
                audit.user_id,
                audit.privilege,
                audit.resource_id,
                audit.allowed,
                audit.policy_id,
                audit.exception_id,
                audit.reason,
                to_millis(&audit.timestamp),
            ],
        )?;
        Ok(audit)
    }

    /// Most recent access decisions for a user
    pub fn list_access_audits(&self, user_id: &str, limit: u32) -> Result<Vec<AccessAudit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, privilege, resource_id, allowed, policy_id, exception_id, reason, timestamp
             FROM access_audit WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let audits = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(AccessAudit {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    privilege: row.get(2)?,
                    resource_id: row.get(3)?,
                    allowed: row.get(4)?,
                    policy_id: row.get(5)?,
                    exception_id: row.get(6)?,
                    reason: row.get(7)?,
                    timestamp: get_time(row, 8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(audits)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Policy Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Load everything evaluation needs in one read transaction.
    pub fn load_policy_snapshot(&self) -> Result<PolicySnapshot> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let data = SnapshotData {
            resources: Self::query_resources(&tx)?,
            roles: Self::query_roles(&tx)?,
            user_roles: Self::query_user_roles(&tx)?,
            policies: Self::query_policies(&tx)?,
            exceptions: Self::query_exceptions(&tx, None)?,
            masking_patterns: Self::query_masking_patterns(&tx)?,
        };
        tx.commit()?;

        debug!(
            resources = data.resources.len(),
            policies = data.policies.len(),
            exceptions = data.exceptions.len(),
            "Loaded policy snapshot"
        );
        Ok(PolicySnapshot::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{DecisionReason, ResourceRef, Subject, evaluate};
    use crate::types::{MaskingType, NewMaskingPattern, PolicyEffect, Sensitivity, SubjectType};
    use crate::masking::MaskingRegistry;
    use std::sync::Arc;

    fn column(table: &str, column: Option<&str>) -> NewDataResource {
        NewDataResource {
            database_id: "db1".into(),
            schema_name: "public".into(),
            table_name: Some(table.into()),
            column_name: column.map(Into::into),
            sensitivity: Sensitivity::Pii,
            description: None,
        }
    }

    fn policy(subject_type: SubjectType, subject_id: &str, resource_id: Option<&str>) -> NewDataAccessPolicy {
        NewDataAccessPolicy {
            name: "p".into(),
            subject_type,
            subject_id: subject_id.into(),
            privilege_code: "READ".into(),
            effect: PolicyEffect::Allow,
            resource_id: resource_id.map(Into::into),
            masking_policy_id: None,
            environment_condition: None,
            priority: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_resource_validation() {
        let db = Database::open_in_memory().unwrap();
        let mut orphan_column = column("t", Some("c"));
        orphan_column.table_name = None;
        assert!(matches!(db.create_resource(&orphan_column), Err(Error::Validation(_))));

        let created = db.create_resource(&column("customers", Some("email"))).unwrap();
        assert_eq!(db.get_resource(&created.id).unwrap().unwrap(), created);
    }

    #[test]
    fn test_roles_and_assignments() {
        let db = Database::open_in_memory().unwrap();
        let staff = db.create_role(&NewRole { name: "staff".into(), parent_id: None }).unwrap();
        let analyst = db
            .create_role(&NewRole {
                name: "analyst".into(),
                parent_id: Some(staff.id.clone()),
            })
            .unwrap();
        assert!(matches!(
            db.create_role(&NewRole { name: "staff".into(), parent_id: None }),
            Err(Error::Conflict(_))
        ));
        assert!(db
            .create_role(&NewRole { name: "x".into(), parent_id: Some("nope".into()) })
            .unwrap_err()
            .is_not_found());

        db.add_user_role("bob", &analyst.id).unwrap();
        db.add_user_role("bob", &analyst.id).unwrap();
        assert_eq!(db.list_user_roles().unwrap().len(), 1);
        assert!(db.add_user_role("bob", "nope").unwrap_err().is_not_found());

        db.remove_user_role("bob", &analyst.id).unwrap();
        assert!(db.list_user_roles().unwrap().is_empty());
    }

    #[test]
    fn test_policy_reference_checks() {
        let db = Database::open_in_memory().unwrap();
        assert!(db
            .create_policy(&policy(SubjectType::User, "u1", Some("missing")))
            .unwrap_err()
            .is_not_found());

        let mut bad_condition = policy(SubjectType::User, "u1", None);
        bad_condition.environment_condition = Some("time.hour >> 3".into());
        assert!(matches!(db.create_policy(&bad_condition), Err(Error::Validation(_))));

        let mut dangling_mask = policy(SubjectType::User, "u1", None);
        dangling_mask.masking_policy_id = Some("missing".into());
        assert!(db.create_policy(&dangling_mask).unwrap_err().is_not_found());
    }

    #[test]
    fn test_policy_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let created = db.create_policy(&policy(SubjectType::Role, "staff", None)).unwrap();
        assert_eq!(db.get_policy(&created.id).unwrap().unwrap(), created);

        db.set_policy_active(&created.id, false).unwrap();
        assert!(!db.get_policy(&created.id).unwrap().unwrap().is_active);

        db.delete_policy(&created.id).unwrap();
        assert!(db.list_policies().unwrap().is_empty());
        assert!(db.delete_policy(&created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_activation_requires_existing_masking_pattern() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = MaskingRegistry::new(db.clone());
        let pattern = registry
            .create(NewMaskingPattern {
                name: "Email".into(),
                description: None,
                masking_type: MaskingType::Redact,
                masking_args: None,
            })
            .unwrap();

        let mut masked = policy(SubjectType::User, "u1", None);
        masked.masking_policy_id = Some(pattern.id.clone());
        masked.is_active = false;
        let created = db.create_policy(&masked).unwrap();

        registry.delete(&pattern.id).unwrap();
        assert!(matches!(
            db.set_policy_active(&created.id, true),
            Err(Error::Conflict(_))
        ));
        assert!(!db.get_policy(&created.id).unwrap().unwrap().is_active);

        db.set_policy_active(&created.id, false).unwrap();
        assert!(db.set_policy_active("missing", true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_snapshot_round_trip_evaluation() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let registry = MaskingRegistry::new(db.clone());
        let pattern = registry
            .create(NewMaskingPattern {
                name: "Card".into(),
                description: None,
                masking_type: MaskingType::Partial,
                masking_args: Some(r#"{"start":2,"end":2}"#.into()),
            })
            .unwrap();

        let table = db.create_resource(&column("payments", None)).unwrap();
        let card = db.create_resource(&column("payments", Some("card_number"))).unwrap();
        let staff = db.create_role(&NewRole { name: "staff".into(), parent_id: None }).unwrap();
        db.add_user_role("alice", &staff.id).unwrap();

        db.create_policy(&policy(SubjectType::Role, &staff.id, Some(&table.id))).unwrap();
        let mut masked = policy(SubjectType::Role, &staff.id, Some(&card.id));
        masked.masking_policy_id = Some(pattern.id.clone());
        let masked = db.create_policy(&masked).unwrap();

        let snapshot = db.load_policy_snapshot().unwrap();
        let decision = evaluate(
            &snapshot,
            &Subject::user("alice"),
            &ResourceRef::column("db1", "public", "payments", "card_number"),
            "READ",
            chrono::Utc::now(),
        );
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::PolicyAllow);
        assert_eq!(decision.policy_id.as_deref(), Some(masked.id.as_str()));
        assert_eq!(decision.masking_type, Some(MaskingType::Partial));
    }

    #[test]
    fn test_access_audit() {
        let db = Database::open_in_memory().unwrap();
        db.record_access(&NewAccessAudit {
            user_id: "alice".into(),
            privilege: "READ".into(),
            resource_id: None,
            allowed: false,
            policy_id: None,
            exception_id: None,
            reason: DecisionReason::NoMatchingPolicy.to_string(),
        })
        .unwrap();
        let audits = db.list_access_audits("alice", 10).unwrap();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].reason, "NO_MATCHING_POLICY");
        assert!(db.list_access_audits("bob", 10).unwrap().is_empty());
    }
}
