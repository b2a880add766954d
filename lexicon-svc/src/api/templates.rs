//! Predefined template listing

use axum::{extract::State, Json};
use lexicon_common::templates::TerminologyTemplate;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<&'static TerminologyTemplate>,
}

/// GET /api/templates
pub async fn list_templates(State(state): State<AppState>) -> Json<TemplateListResponse> {
    Json(TemplateListResponse {
        templates: state.engine.list_templates(),
    })
}
