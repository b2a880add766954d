//! Repository port
//!
//! Everything the engine reads or writes goes through [`TerminologyRepository`].
//! Two implementations ship with the crate: [`InMemoryRepository`] and, with
//! the `sqlx` feature, [`crate::db::SqliteRepository`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::merge::{BehaviorMap, OverrideBehavior};
use crate::transform::{set_path, validate_key};
use crate::value::{TermMap, TermValue};
use crate::Result;

pub mod memory;

pub use memory::InMemoryRepository;

/// A persisted terminology value for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminologyEntry {
    pub key: String,
    pub value: TermValue,
    pub override_behavior: OverrideBehavior,
    pub entity_id: String,
}

impl TerminologyEntry {
    pub fn new(
        entity_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<TermValue>,
        override_behavior: OverrideBehavior,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            override_behavior,
            entity_id: entity_id.into(),
        }
    }
}

/// Caller-supplied record for `save_terminology`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminologyRecord {
    pub key: String,
    pub value: TermValue,
    #[serde(default, alias = "overrideBehavior")]
    pub override_behavior: Option<OverrideBehavior>,
}

impl TerminologyRecord {
    pub fn new(key: impl Into<String>, value: impl Into<TermValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            override_behavior: None,
        }
    }

    pub fn with_behavior(mut self, behavior: OverrideBehavior) -> Self {
        self.override_behavior = Some(behavior);
        self
    }
}

/// Per-entity customization settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySettings {
    /// Terminology customization toggle (e.g. white-labeling)
    pub enabled: bool,
}

impl Default for EntitySettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A/B test assignment for an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbAssignment {
    pub test_id: String,
    pub variant: String,
}

/// Storage and lookup contract consumed by the engine
///
/// Every method is a single external call and may fail independently; the
/// resolver decides which failures are fatal.
#[async_trait]
pub trait TerminologyRepository: Send + Sync {
    /// Stored entries for one entity
    async fn get_entries(&self, entity: &EntityRef) -> Result<Vec<TerminologyEntry>>;

    /// Insert or overwrite entries; all or nothing
    async fn insert_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()>;

    /// Delete entries whose key equals `key_prefix` or nests below it
    async fn delete_entries_by_prefix(&self, entity: &EntityRef, key_prefix: &str) -> Result<u64>;

    /// Delete every entry of one entity
    async fn delete_all_entries(&self, entity: &EntityRef) -> Result<u64>;

    /// Delete every entry of one entity, then insert `entries`; all or nothing
    async fn replace_entries(&self, entity: &EntityRef, entries: &[TerminologyEntry]) -> Result<()>;

    /// Immediate parent in the inheritance chain, if any
    async fn get_parent(&self, entity: &EntityRef) -> Result<Option<EntityRef>>;

    /// System default entries
    async fn get_system_defaults(&self) -> Result<Vec<TerminologyEntry>>;

    /// Customization settings; implementations return the default when unset
    async fn get_settings(&self, entity: &EntityRef) -> Result<EntitySettings>;

    /// A/B test assignment, if the entity takes part in one
    async fn get_ab_assignment(&self, entity: &EntityRef) -> Result<Option<AbAssignment>>;

    /// Term set for one test variant
    async fn get_ab_variant_terms(&self, test_id: &str, variant: &str) -> Result<Option<TermMap>>;
}

/// Build one level's override tree and declared behaviors from its entries
///
/// Every entry declares its behavior at its own key, so an object stored
/// under `replace` supersedes the whole inherited subtree. Fails if two entries collide structurally (`a` as leaf and `a.b`).
pub fn entries_to_layer(entries: &[TerminologyEntry]) -> Result<(TermMap, BehaviorMap)> {
    let mut sorted: Vec<&TerminologyEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut terms = TermMap::new();
    let mut behaviors = BehaviorMap::new();
    for entry in sorted {
        validate_key(&entry.key)?;
        set_path(&mut terms, &entry.key, entry.value.clone())?;
        behaviors.insert(entry.key.clone(), entry.override_behavior);
    }
    Ok((terms, behaviors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_entries_to_layer_nests_keys_and_keeps_behaviors() {
        let entries = vec![
            TerminologyEntry::new("T1", "journeyTerms.mainUnit.singular", "quest", OverrideBehavior::Replace),
            TerminologyEntry::new("T1", "stepTerms", TermValue::Object(TermMap::new()), OverrideBehavior::Merge),
        ];
        let (terms, behaviors) = entries_to_layer(&entries).unwrap();

        assert_eq!(
            crate::transform::get_path(&terms, "journeyTerms.mainUnit.singular"),
            Some(&TermValue::from("quest"))
        );
        assert_eq!(behaviors.get("stepTerms"), Some(&OverrideBehavior::Merge));
        assert_eq!(
            behaviors.get("journeyTerms.mainUnit.singular"),
            Some(&OverrideBehavior::Replace)
        );
        assert!(!behaviors.contains_key("journeyTerms.mainUnit"));
    }

    #[test]
    fn test_entries_to_layer_rejects_collisions() {
        let entries = vec![
            TerminologyEntry::new("T1", "a.b", "nested", OverrideBehavior::Replace),
            TerminologyEntry::new("T1", "a", "leaf", OverrideBehavior::Replace),
        ];
        assert!(matches!(
            entries_to_layer(&entries),
            Err(Error::StructuralConflict { .. })
        ));
    }

    #[test]
    fn test_record_accepts_camel_case_behavior() {
        let record: TerminologyRecord = serde_json::from_value(serde_json::json!({
            "key": "toolTerms.label",
            "value": "Gadget",
            "overrideBehavior": "suggest"
        }))
        .unwrap();
        assert_eq!(record.override_behavior, Some(OverrideBehavior::Suggest));
    }
}
