//! Connection configuration routes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use dbc_core::connection::{
    ConnectionFormData, ParsedFields, SyncCoordinator, build_uri, default_port, parse_uri, redact_uri,
};
use dbc_core::types::{ConnectionConfig, NewConnection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Create connection router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connections", get(list_connections).post(create_connection))
        .route("/connections/uri/parse", post(parse_connection_uri))
        .route("/connections/uri/build", post(build_connection_uri))
        .route("/connections/sync-config", get(sync_config))
        .route(
            "/connections/{id}",
            get(get_connection).put(update_connection).delete(delete_connection),
        )
}

#[derive(Debug, Deserialize)]
pub struct ParseUriRequest {
    pub uri: String,
}

/// Split a URI into fields; `null` when it cannot be parsed.
pub async fn parse_connection_uri(Json(req): Json<ParseUriRequest>) -> Json<Option<ParsedFields>> {
    Json(parse_uri(&req.uri))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildUriRequest {
    pub db_type: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildUriResponse {
    pub uri: String,
}

pub async fn build_connection_uri(Json(req): Json<BuildUriRequest>) -> Json<BuildUriResponse> {
    Json(BuildUriResponse {
        uri: build_uri(
            &req.db_type,
            &req.host,
            &req.port,
            &req.user,
            &req.password,
            &req.database,
        ),
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigResponse {
    pub fields_debounce_ms: u64,
    pub uri_debounce_ms: u64,
}

/// Debounce windows form clients should use.
pub async fn sync_config(State(state): State<Arc<AppState>>) -> Json<SyncConfigResponse> {
    let sync = state.config.sync;
    Json(SyncConfigResponse {
        fields_debounce_ms: sync.fields_debounce.as_millis() as u64,
        uri_debounce_ms: sync.uri_debounce.as_millis() as u64,
    })
}

pub async fn list_connections(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ConnectionConfig>>> {
    Ok(Json(state.db.list_connections()?))
}

pub async fn get_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectionConfig>> {
    state
        .db
        .get_connection(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::from(dbc_core::Error::not_found("Connection", id)))
}

pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewConnection>,
) -> ApiResult<(StatusCode, Json<ConnectionConfig>)> {
    let input = reconcile(req);
    let connection = state.db.create_connection(&input)?;
    Ok((StatusCode::CREATED, Json(connection)))
}

pub async fn update_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<NewConnection>,
) -> ApiResult<Json<ConnectionConfig>> {
    let input = reconcile(req);
    Ok(Json(state.db.update_connection(&id, &input)?))
}

pub async fn delete_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.delete_connection(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Fill in whichever representation the client left empty.
///
/// A blank URI is built from the fields; blank fields are parsed from the URI.
/// When both are present they are stored as sent.
fn reconcile(mut input: NewConnection) -> NewConnection {
    let form = ConnectionFormData {
        name: input.name.clone(),
        host: input.host.clone(),
        port: input.port.clone(),
        user: input.user.clone(),
        password: input.password.clone(),
        database: input.database.clone(),
        description: input.description.clone(),
        uri: input.uri.clone(),
    };
    let mut sync = SyncCoordinator::new(form, input.db_type.clone());

    if input.uri.trim().is_empty() {
        sync.resync_uri();
    } else if input.host.is_empty() && input.user.is_empty() && input.database.is_empty() {
        sync.handle_uri_change(input.uri.clone(), Instant::now());
        sync.flush();
    } else if parse_uri(&input.uri).is_some_and(|parsed| fields_match(&input, &parsed)) {
        return input;
    } else {
        // Fields win over a URI that describes a different connection.
        sync.resync_uri();
    }

    let form = sync.into_form();
    debug!(uri = %redact_uri(&form.uri), "Reconciled connection fields and URI");
    input.host = form.host;
    input.port = form.port;
    input.user = form.user;
    input.password = form.password;
    input.database = form.database;
    input.uri = form.uri;
    input
}

/// Whether `parsed` describes the same connection as the input fields. A blank
/// port and the type's default port are interchangeable.
fn fields_match(input: &NewConnection, parsed: &ParsedFields) -> bool {
    let port = |p: &str| {
        if p.is_empty() {
            default_port(&input.db_type).unwrap_or("").to_string()
        } else {
            p.to_string()
        }
    };
    parsed.host == input.host
        && port(&parsed.port) == port(&input.port)
        && parsed.user == input.user
        && parsed.password == input.password
        && parsed.database == input.database
}
