//! # Lexicon Common Library
//!
//! Terminology resolution engine shared by the Lexicon service and any
//! embedding application:
//! - Value model and flatten/unflatten transforms
//! - Override merging (replace, merge, suggest)
//! - Inheritance chain construction over the tenancy hierarchy
//! - Resolver with TTL cache and predefined templates
//! - Repository port with in-memory and SQLite implementations
//! - Configuration loading

pub mod cache;
pub mod chain;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod defaults;
pub mod entity;
pub mod error;
pub mod merge;
pub mod repository;
pub mod resolver;
pub mod templates;
pub mod transform;
pub mod value;

pub use cache::ResolutionCache;
pub use config::EngineConfig;
pub use entity::{EntityRef, EntityType};
pub use error::{Error, Result};
pub use merge::OverrideBehavior;
pub use repository::{InMemoryRepository, TerminologyEntry, TerminologyRecord, TerminologyRepository};
pub use resolver::TerminologyEngine;
pub use value::{TermMap, TermValue};
