//! Cache maintenance endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{parse_entity_type, ApiError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ClearCacheParams {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: usize,
}

/// POST /api/cache/clear?entity_type=&entity_id=
///
/// No parameters clears everything; `entity_id` needs `entity_type`.
pub async fn clear_cache(
    State(state): State<AppState>,
    Query(params): Query<ClearCacheParams>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let entity_type = params
        .entity_type
        .as_deref()
        .map(parse_entity_type)
        .transpose()?;

    if entity_type.is_none() && params.entity_id.is_some() {
        return Err(ApiError::BadRequest(
            "entity_id requires entity_type".to_string(),
        ));
    }

    let cleared = state
        .engine
        .clear_cache(entity_type, params.entity_id.as_deref())
        .await;
    info!("Cache clear requested: {} entries removed", cleared);
    Ok(Json(ClearCacheResponse { cleared }))
}
