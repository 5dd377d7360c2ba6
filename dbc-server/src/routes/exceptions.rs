//! Policy exception routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use dbc_core::access::EffectiveStatus;
use dbc_core::types::{
    ExceptionAction, ExceptionAudit, ExceptionStatus, NewPolicyException, PolicyException,
};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create exception router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/exceptions", get(list_exceptions).post(request_exception))
        .route("/exceptions/{id}", get(get_exception))
        .route("/exceptions/{id}/approve", post(approve_exception))
        .route("/exceptions/{id}/reject", post(reject_exception))
        .route("/exceptions/{id}/revoke", post(revoke_exception))
}

/// Exception with its status as of the request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionResponse {
    #[serde(flatten)]
    pub exception: PolicyException,
    pub effective_status: EffectiveStatus,
}

impl From<PolicyException> for ExceptionResponse {
    fn from(exception: PolicyException) -> Self {
        Self {
            effective_status: exception.effective_status(&Utc::now()),
            exception,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetail {
    #[serde(flatten)]
    pub exception: ExceptionResponse,
    pub audits: Vec<ExceptionAudit>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list_exceptions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ExceptionResponse>>> {
    let status = query
        .status
        .map(|s| s.parse::<ExceptionStatus>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let exceptions = state.db.list_exceptions(status)?;
    Ok(Json(exceptions.into_iter().map(Into::into).collect()))
}

pub async fn request_exception(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(req): Json<NewPolicyException>,
) -> ApiResult<(StatusCode, Json<ExceptionResponse>)> {
    let exception = state.db.create_exception(&req, actor.user_id())?;
    Ok((StatusCode::CREATED, Json(exception.into())))
}

pub async fn get_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExceptionDetail>> {
    let exception = state
        .db
        .get_exception(&id)?
        .ok_or_else(|| dbc_core::Error::not_found("PolicyException", &id))?;
    let audits = state.db.list_exception_audits(&id)?;

    Ok(Json(ExceptionDetail {
        exception: exception.into(),
        audits,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransitionRequest {
    /// Free-text note stored with the audit entry.
    pub context: Option<String>,
}

fn transition(
    state: &AppState,
    id: &str,
    action: ExceptionAction,
    actor: &Actor,
    body: Bytes,
) -> ApiResult<Json<ExceptionResponse>> {
    // The body is optional; an empty one means no context.
    let req: TransitionRequest = if body.is_empty() {
        TransitionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };
    let context = req.context;
    let exception = state
        .db
        .transition_exception(id, action, actor.user_id(), context.as_deref())?;
    Ok(Json(exception.into()))
}

pub async fn approve_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    body: Bytes,
) -> ApiResult<Json<ExceptionResponse>> {
    transition(&state, &id, ExceptionAction::Approve, &actor, body)
}

pub async fn reject_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    body: Bytes,
) -> ApiResult<Json<ExceptionResponse>> {
    transition(&state, &id, ExceptionAction::Reject, &actor, body)
}

pub async fn revoke_exception(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    actor: Actor,
    body: Bytes,
) -> ApiResult<Json<ExceptionResponse>> {
    transition(&state, &id, ExceptionAction::Revoke, &actor, body)
}
