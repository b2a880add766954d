//! lexicon-svc library - HTTP surface over the terminology engine

use axum::Router;
use lexicon_common::TerminologyEngine;
use tower_http::trace::TraceLayer;

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Engine handle; clones share the repository and cache
    pub engine: TerminologyEngine,
}

impl AppState {
    pub fn new(engine: TerminologyEngine) -> Self {
        Self { engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let terminology = Router::new()
        .route(
            "/api/terminology/:entity_type/:entity_id",
            get(api::get_terminology)
                .put(api::save_terminology)
                .delete(api::delete_entity_terminology),
        )
        .route(
            "/api/terminology/:entity_type/:entity_id/category/:category",
            delete(api::delete_category),
        )
        .route(
            "/api/terminology/:entity_type/:entity_id/template/:template_key",
            post(api::apply_template),
        )
        .route(
            "/api/terminology/:entity_type/:entity_id/ownership-changed",
            post(api::ownership_changed),
        )
        .route("/api/templates", get(api::list_templates))
        .route("/api/cache/clear", post(api::clear_cache));

    Router::new()
        .merge(terminology)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
