//! Resource, role, policy and evaluation routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use chrono::{DateTime, Utc};
use dbc_core::access::{Decision, ResourceRef, Subject, evaluate, evaluate_columns};
use dbc_core::types::{
    AccessAudit, DataAccessPolicy, DataResource, NewAccessAudit, NewDataAccessPolicy,
    NewDataResource, NewRole, Role, SubjectType, UserRole,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_AUDIT_LIMIT: u32 = 50;

/// Create access control router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/resources", get(list_resources).post(create_resource))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/members", get(list_members))
        .route("/roles/{id}/members", post(add_member))
        .route("/roles/{id}/members/{user_id}", delete(remove_member))
        .route("/policies", get(list_policies).post(create_policy))
        .route("/policies/{id}", patch(set_policy_active).delete(delete_policy))
        .route("/access/evaluate", post(evaluate_access))
        .route("/access/audits", get(list_audits))
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources & roles
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_resources(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<DataResource>>> {
    Ok(Json(state.db.list_resources()?))
}

pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewDataResource>,
) -> ApiResult<(StatusCode, Json<DataResource>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_resource(&req)?)))
}

pub async fn list_roles(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Role>>> {
    Ok(Json(state.db.list_roles()?))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewRole>,
) -> ApiResult<(StatusCode, Json<Role>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_role(&req)?)))
}

pub async fn list_members(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserRole>>> {
    Ok(Json(state.db.list_user_roles()?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: String,
}

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<StatusCode> {
    state.db.add_user_role(&req.user_id, &role_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((role_id, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.db.remove_user_role(&user_id, &role_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_policies(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<DataAccessPolicy>>> {
    Ok(Json(state.db.list_policies()?))
}

pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewDataAccessPolicy>,
) -> ApiResult<(StatusCode, Json<DataAccessPolicy>)> {
    Ok((StatusCode::CREATED, Json(state.db.create_policy(&req)?)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub is_active: bool,
}

pub async fn set_policy_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> ApiResult<StatusCode> {
    state.db.set_policy_active(&id, req.is_active)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.delete_policy(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub subject: Subject,
    pub resource: ResourceRef,
    pub privilege: String,
    /// Result columns read from `resource`, evaluated one by one.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Evaluation time; defaults to now.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDecision {
    pub name: String,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnDecision>,
}

/// Evaluate access against a fresh snapshot; user decisions are audited.
pub async fn evaluate_access(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<EvaluateResponse>> {
    let snapshot = state.snapshot()?;
    let now = req.at.unwrap_or_else(Utc::now);

    let decision = evaluate(&snapshot, &req.subject, &req.resource, &req.privilege, now);

    let columns = if req.columns.is_empty() {
        Vec::new()
    } else {
        let names: Vec<&str> = req.columns.iter().map(String::as_str).collect();
        evaluate_columns(&snapshot, &req.subject, &req.resource, &names, &req.privilege, now)
            .columns()
            .iter()
            .map(|c| ColumnDecision {
                name: c.name.clone(),
                decision: c.decision.clone(),
            })
            .collect()
    };

    if req.subject.subject_type == SubjectType::User {
        let resource_id = snapshot
            .resource_chain(&req.resource)
            .first()
            .map(|r| r.id.clone());
        state.db.record_access(&NewAccessAudit {
            user_id: req.subject.id.clone(),
            privilege: req.privilege.clone(),
            resource_id,
            allowed: decision.allowed,
            policy_id: decision.policy_id.clone(),
            exception_id: decision.exception_id.clone(),
            reason: decision.reason.to_string(),
        })?;
    }

    Ok(Json(EvaluateResponse { decision, columns }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub user_id: String,
    pub limit: Option<u32>,
}

pub async fn list_audits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AccessAudit>>> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Ok(Json(state.db.list_access_audits(&query.user_id, limit)?))
}
