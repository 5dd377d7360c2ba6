//! Policy exceptions and their audit trail.
//!
//! Every status change is written together with its audit row in one
//! transaction.

use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

use super::{Database, get_enum, get_time, new_id, now, to_millis, truncate_millis};
use crate::access::{next_status, validate_request};
use crate::error::{Error, Result};
use crate::types::{
    ExceptionAction, ExceptionAudit, ExceptionStatus, NewPolicyException, PolicyException,
};

const EXCEPTION_COLUMNS: &str = "id, subject_type, subject_id, resource_id, override_privilege, scope,
        purpose, start_time, end_time, approved_by, risk_level, status, created_at";

impl Database {
    /// File a new exception request (PENDING) on behalf of `requested_by`.
    pub fn create_exception(
        &self,
        input: &NewPolicyException,
        requested_by: &str,
    ) -> Result<PolicyException> {
        validate_request(input)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if let Some(resource_id) = &input.resource_id {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM data_resource WHERE id = ?1)",
                params![resource_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(Error::not_found("DataResource", resource_id));
            }
        }

        let exception = PolicyException {
            id: new_id(),
            subject_type: input.subject_type,
            subject_id: input.subject_id.clone(),
            resource_id: input.resource_id.clone(),
            override_privilege: input.override_privilege.clone(),
            scope: input.scope,
            purpose: input.purpose.clone(),
            start_time: truncate_millis(input.start_time),
            end_time: truncate_millis(input.end_time),
            approved_by: None,
            risk_level: input.risk_level,
            status: ExceptionStatus::Pending,
            created_at: now(),
        };
        tx.execute(
            "INSERT INTO policy_exception
             (id, subject_type, subject_id, resource_id, override_privilege, scope, purpose,
              start_time, end_time, approved_by, risk_level, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL, ?10, ?11, ?12)",
            params![
                exception.id,
                exception.subject_type.as_str(),
                exception.subject_id,
                exception.resource_id,
                exception.override_privilege,
                exception.scope.as_str(),
                exception.purpose,
                to_millis(&exception.start_time),
                to_millis(&exception.end_time),
                exception.risk_level.as_str(),
                exception.status.as_str(),
                to_millis(&exception.created_at),
            ],
        )?;
        Self::insert_exception_audit(
            &tx,
            &exception.id,
            requested_by,
            ExceptionAction::Request,
            Some(&exception.purpose),
        )?;
        tx.commit()?;

        info!(
            id = %exception.id,
            subject = %exception.subject_id,
            privilege = %exception.override_privilege,
            risk = %exception.risk_level,
            "Policy exception requested"
        );
        Ok(exception)
    }

    pub fn get_exception(&self, id: &str) -> Result<Option<PolicyException>> {
        let conn = self.lock()?;
        Self::query_exception(&conn, id)
    }

    /// List exceptions, newest first, optionally filtered by stored status.
    pub fn list_exceptions(&self, status: Option<ExceptionStatus>) -> Result<Vec<PolicyException>> {
        let conn = self.lock()?;
        Self::query_exceptions(&conn, status)
    }

    /// Apply an approve/reject/revoke action by `actor`.
    pub fn transition_exception(
        &self,
        id: &str,
        action: ExceptionAction,
        actor: &str,
        context: Option<&str>,
    ) -> Result<PolicyException> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut exception =
            Self::query_exception(&tx, id)?.ok_or_else(|| Error::not_found("PolicyException", id))?;
        let status = next_status(exception.status, action)?;

        if action == ExceptionAction::Approve {
            exception.approved_by = Some(actor.to_string());
        }
        exception.status = status;
        tx.execute(
            "UPDATE policy_exception SET status = ?1, approved_by = ?2 WHERE id = ?3",
            params![exception.status.as_str(), exception.approved_by, id],
        )?;
        Self::insert_exception_audit(&tx, id, actor, action, context)?;
        tx.commit()?;

        info!(id, actor, status = %exception.status, "Policy exception {}", action.as_str().to_ascii_lowercase());
        Ok(exception)
    }

    /// Audit trail of one exception, oldest first
    pub fn list_exception_audits(&self, exception_id: &str) -> Result<Vec<ExceptionAudit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, exception_id, user_id, action, context, timestamp
             FROM exception_audit WHERE exception_id = ?1 ORDER BY timestamp, rowid",
        )?;
        let audits = stmt
            .query_map(params![exception_id], |row| {
                Ok(ExceptionAudit {
                    id: row.get(0)?,
                    exception_id: row.get(1)?,
                    user_id: row.get(2)?,
                    action: get_enum(row, 3)?,
                    context: row.get(4)?,
                    timestamp: get_time(row, 5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(audits)
    }

    fn insert_exception_audit(
        conn: &Connection,
        exception_id: &str,
        user_id: &str,
        action: ExceptionAction,
        context: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO exception_audit (id, exception_id, user_id, action, context, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new_id(),
                exception_id,
                user_id,
                action.as_str(),
                context,
                to_millis(&now()),
            ],
        )?;
        Ok(())
    }

    fn query_exception(conn: &Connection, id: &str) -> Result<Option<PolicyException>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM policy_exception WHERE id = ?1"
        ))?;
        Ok(stmt.query_row(params![id], Self::map_exception).optional()?)
    }

    pub(super) fn query_exceptions(
        conn: &Connection,
        status: Option<ExceptionStatus>,
    ) -> Result<Vec<PolicyException>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {EXCEPTION_COLUMNS} FROM policy_exception
             WHERE ?1 IS NULL OR status = ?1
             ORDER BY created_at DESC"
        ))?;
        let exceptions = stmt
            .query_map(params![status.map(|s| s.as_str())], Self::map_exception)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(exceptions)
    }

    fn map_exception(row: &rusqlite::Row) -> rusqlite::Result<PolicyException> {
        Ok(PolicyException {
            id: row.get(0)?,
            subject_type: get_enum(row, 1)?,
            subject_id: row.get(2)?,
            resource_id: row.get(3)?,
            override_privilege: row.get(4)?,
            scope: get_enum(row, 5)?,
            purpose: row.get(6)?,
            start_time: get_time(row, 7)?,
            end_time: get_time(row, 8)?,
            approved_by: row.get(9)?,
            risk_level: get_enum(row, 10)?,
            status: get_enum(row, 11)?,
            created_at: get_time(row, 12)?,
        })
    }
}
