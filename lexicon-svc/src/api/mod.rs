//! HTTP API handlers for lexicon-svc

pub mod cache;
pub mod error;
pub mod health;
pub mod templates;
pub mod terminology;

pub use cache::clear_cache;
pub use error::ApiError;
pub use health::health_routes;
pub use templates::list_templates;
pub use terminology::{
    apply_template, delete_category, delete_entity_terminology, get_terminology, ownership_changed,
    save_terminology,
};
