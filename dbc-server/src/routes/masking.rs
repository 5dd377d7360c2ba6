//! Masking pattern routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use dbc_core::masking::MaskingRegistry;
use dbc_core::types::{MaskingPattern, MaskingPatternUpdate, MaskingType, NewMaskingPattern};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Create masking pattern router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/masking-patterns", get(list_patterns).post(create_pattern))
        .route("/masking-patterns/preview", post(preview_pattern))
        .route(
            "/masking-patterns/{id}",
            get(get_pattern).put(update_pattern).delete(delete_pattern),
        )
}

pub async fn list_patterns(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<MaskingPattern>>> {
    Ok(Json(state.masking.list()?))
}

pub async fn get_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MaskingPattern>> {
    Ok(Json(state.masking.get(&id)?))
}

pub async fn create_pattern(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewMaskingPattern>,
) -> ApiResult<(StatusCode, Json<MaskingPattern>)> {
    let pattern = state.masking.create(req)?;
    Ok((StatusCode::CREATED, Json(pattern)))
}

pub async fn update_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<MaskingPatternUpdate>,
) -> ApiResult<Json<MaskingPattern>> {
    Ok(Json(state.masking.update(&id, req)?))
}

pub async fn delete_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.masking.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub masking_type: MaskingType,
    #[serde(default)]
    pub masking_args: Option<String>,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreviewResponse {
    /// `None` when the pattern nullifies the value.
    pub masked: Option<String>,
}

/// Run an unsaved pattern against a sample value.
pub async fn preview_pattern(Json(req): Json<PreviewRequest>) -> ApiResult<Json<PreviewResponse>> {
    let masked = MaskingRegistry::preview(req.masking_type, req.masking_args.as_deref(), &req.value)?;
    Ok(Json(PreviewResponse { masked }))
}
