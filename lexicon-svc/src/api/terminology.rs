//! Terminology resolution and editing endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use lexicon_common::templates::get_template;
use lexicon_common::transform::validate_key;
use lexicon_common::{TermMap, TerminologyRecord};
use serde::{Deserialize, Serialize};

use super::error::{parse_entity_type, ApiError};
use crate::AppState;

/// Query parameters for resolution
#[derive(Debug, Default, Deserialize)]
pub struct ResolveParams {
    /// Comma-separated key paths; all terminology when absent
    pub keys: Option<String>,
    #[serde(default)]
    pub ignore_cache: bool,
}

impl ResolveParams {
    fn key_list(&self) -> Option<Vec<String>> {
        let keys: Vec<String> = self
            .keys
            .as_deref()?
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        (!keys.is_empty()).then_some(keys)
    }
}

#[derive(Debug, Serialize)]
pub struct TerminologyResponse {
    pub entity_type: String,
    pub entity_id: String,
    pub terminology: TermMap,
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub records: Vec<TerminologyRecord>,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<usize>,
}

impl MutationResponse {
    fn ok() -> Self {
        Self {
            success: true,
            saved: None,
        }
    }
}

/// GET /api/terminology/:entity_type/:entity_id?keys=a,b&ignore_cache=true
pub async fn get_terminology(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Query(params): Query<ResolveParams>,
) -> Result<Json<TerminologyResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    let keys = params.key_list();

    let terminology = state
        .engine
        .resolve_terminology(parsed, &entity_id, keys.as_deref(), params.ignore_cache)
        .await;

    Ok(Json(TerminologyResponse {
        entity_type: parsed.to_string(),
        entity_id,
        terminology,
    }))
}

/// PUT /api/terminology/:entity_type/:entity_id
pub async fn save_terminology(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
    Json(request): Json<SaveRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    for record in &request.records {
        validate_key(&record.key).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }

    if !state
        .engine
        .save_terminology(parsed, &entity_id, &request.records)
        .await
    {
        return Err(ApiError::OperationFailed(format!(
            "Failed to save terminology for {}:{}",
            parsed, entity_id
        )));
    }

    Ok(Json(MutationResponse {
        success: true,
        saved: Some(request.records.len()),
    }))
}

/// DELETE /api/terminology/:entity_type/:entity_id
pub async fn delete_entity_terminology(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    if !state.engine.delete_entity_terminology(parsed, &entity_id).await {
        return Err(ApiError::OperationFailed(format!(
            "Failed to delete terminology for {}:{}",
            parsed, entity_id
        )));
    }
    Ok(Json(MutationResponse::ok()))
}

/// DELETE /api/terminology/:entity_type/:entity_id/category/:category
pub async fn delete_category(
    State(state): State<AppState>,
    Path((entity_type, entity_id, category)): Path<(String, String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    validate_key(&category).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    if !state
        .engine
        .delete_terminology_for_category(parsed, &entity_id, &category)
        .await
    {
        return Err(ApiError::OperationFailed(format!(
            "Failed to delete category '{}' for {}:{}",
            category, parsed, entity_id
        )));
    }
    Ok(Json(MutationResponse::ok()))
}

/// POST /api/terminology/:entity_type/:entity_id/template/:template_key
pub async fn apply_template(
    State(state): State<AppState>,
    Path((entity_type, entity_id, template_key)): Path<(String, String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    if get_template(&template_key).is_none() {
        return Err(ApiError::NotFound(format!("Unknown template: {}", template_key)));
    }

    if !state
        .engine
        .apply_predefined_terminology(parsed, &entity_id, &template_key)
        .await
    {
        return Err(ApiError::OperationFailed(format!(
            "Failed to apply template '{}' to {}:{}",
            template_key, parsed, entity_id
        )));
    }
    Ok(Json(MutationResponse::ok()))
}

/// POST /api/terminology/:entity_type/:entity_id/ownership-changed
///
/// Called by the application after re-parenting an entity.
pub async fn ownership_changed(
    State(state): State<AppState>,
    Path((entity_type, entity_id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>, ApiError> {
    let parsed = parse_entity_type(&entity_type)?;
    state.engine.notify_ownership_changed(parsed, &entity_id).await;
    Ok(Json(MutationResponse::ok()))
}
