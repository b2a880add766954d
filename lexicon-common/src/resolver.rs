//! Terminology resolution engine
//!
//! Resolution order for an entity:
//! 1. cached result, unless the caller asks to bypass the cache
//! 2. system defaults (cached separately, compiled fallback if unreadable)
//! 3. `system` entities and entities with customization disabled get defaults
//! 4. an A/B variant, when assigned, is merged onto defaults and returned
//! 5. otherwise every level of the inheritance chain is fetched concurrently
//!    and merged root to leaf, so the entity's own overrides win
//!
//! Reads never fail: a level that cannot be fetched is skipped with a warning.
//! Writes report success as `bool` and log the failure.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::{cache_key, ResolutionCache};
use crate::chain::build_chain;
use crate::defaults::{fallback_terms, SYSTEM_ENTITY_ID};
use crate::entity::{EntityRef, EntityType};
use crate::merge::{merge_terminology, BehaviorMap, OverrideBehavior};
use crate::repository::{entries_to_layer, EntitySettings, TerminologyEntry, TerminologyRecord, TerminologyRepository};
use crate::templates::{self, TerminologyTemplate};
use crate::transform::{flatten, get_path, key_has_prefix, set_path, validate_key};
use crate::value::{TermMap, TermValue};
use crate::Result;

/// Cache key under which the system defaults are kept
pub const DEFAULTS_CACHE_KEY: &str = "system:defaults";

/// Outcome of one uncached resolution
struct Resolution {
    terms: TermMap,
    /// A fetch failed along the way; the result is not cached
    degraded: bool,
}

/// Resolves, stores and caches terminology for all tenancy levels
///
/// Cheap to clone; clones share the repository and the cache.
#[derive(Clone)]
pub struct TerminologyEngine {
    repo: Arc<dyn TerminologyRepository>,
    cache: Arc<ResolutionCache>,
}

impl TerminologyEngine {
    pub fn new(repo: Arc<dyn TerminologyRepository>, cache: Arc<ResolutionCache>) -> Self {
        Self { repo, cache }
    }

    /// Engine with its own cache using `ttl`
    pub fn with_ttl(repo: Arc<dyn TerminologyRepository>, ttl: Duration) -> Self {
        Self::new(repo, Arc::new(ResolutionCache::new(ttl)))
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn repository(&self) -> &Arc<dyn TerminologyRepository> {
        &self.repo
    }

    /// Resolve the terminology visible to one entity
    ///
    /// With `keys`, only the subtrees at those key paths are returned. Never
    /// fails; the worst case is the compiled fallback vocabulary.
    pub async fn resolve_terminology(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        keys: Option<&[String]>,
        ignore_cache: bool,
    ) -> TermMap {
        let entity = entity_ref(entity_type, entity_id);
        let key = cache_key(&entity, keys);

        if !ignore_cache {
            if let Some(hit) = self.cache.get(&key).await {
                debug!("Terminology cache hit for {}", key);
                return hit;
            }
        }

        let generation = self.cache.generation();
        let Resolution { terms, degraded } = self.resolve_uncached(&entity, ignore_cache).await;
        let terms = match keys {
            Some(keys) if !keys.is_empty() => select_keys(&terms, keys),
            _ => terms,
        };

        if degraded {
            debug!("Not caching degraded resolution for {}", key);
        } else {
            self.cache.insert_if_current(key, terms.clone(), generation).await;
        }
        terms
    }

    /// Resolve and return the value at one key path
    pub async fn get_term(&self, entity_type: EntityType, entity_id: &str, key_path: &str) -> Option<TermValue> {
        let resolved = self.resolve_terminology(entity_type, entity_id, None, false).await;
        get_path(&resolved, key_path).cloned()
    }

    async fn resolve_uncached(&self, entity: &EntityRef, ignore_cache: bool) -> Resolution {
        let (defaults, mut degraded) = match self.load_system_defaults(ignore_cache).await {
            Some(defaults) => (defaults, false),
            None => (fallback_terms(), true),
        };

        if entity.entity_type == EntityType::System {
            return Resolution { terms: defaults, degraded };
        }

        let settings = match self.repo.get_settings(entity).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load terminology settings for {}: {}, assuming enabled", entity, e);
                degraded = true;
                EntitySettings::default()
            }
        };
        if !settings.enabled {
            debug!("Terminology customization disabled for {}, using defaults", entity);
            return Resolution { terms: defaults, degraded };
        }

        if let Some(variant_terms) = self.ab_variant_terms(entity).await {
            let terms = merge_terminology(&defaults, &variant_terms, &BehaviorMap::new());
            return Resolution { terms, degraded };
        }

        let chain = build_chain(self.repo.as_ref(), entity).await;
        if chain.is_truncated() {
            degraded = true;
        }

        let levels: Vec<&EntityRef> = chain.root_to_leaf().collect();
        let fetched = join_all(levels.iter().map(|level| self.fetch_level(level))).await;

        let mut terms = defaults;
        for (level, result) in levels.iter().zip(fetched) {
            match result {
                Ok((overrides, behaviors)) => {
                    terms = merge_terminology(&terms, &overrides, &behaviors);
                }
                Err(e) => {
                    warn!("Skipping {} while resolving {}: {}", level, entity, e);
                    degraded = true;
                }
            }
        }

        Resolution { terms, degraded }
    }

    async fn fetch_level(&self, level: &EntityRef) -> Result<(TermMap, BehaviorMap)> {
        let entries = self.repo.get_entries(level).await?;
        entries_to_layer(&entries)
    }

    /// System defaults, from cache when allowed; `None` if unreadable or empty
    async fn load_system_defaults(&self, ignore_cache: bool) -> Option<TermMap> {
        if !ignore_cache {
            if let Some(defaults) = self.cache.get(DEFAULTS_CACHE_KEY).await {
                return Some(defaults);
            }
        }

        let generation = self.cache.generation();
        let loaded = match self.repo.get_system_defaults().await {
            Ok(entries) => entries_to_layer(&entries),
            Err(e) => Err(e),
        };

        match loaded {
            Ok((defaults, _)) if !defaults.is_empty() => {
                self.cache
                    .insert_if_current(DEFAULTS_CACHE_KEY.to_string(), defaults.clone(), generation)
                    .await;
                Some(defaults)
            }
            Ok(_) => {
                warn!("No system default terminology stored, using compiled fallback");
                None
            }
            Err(e) => {
                error!("Failed to load system default terminology: {}, using compiled fallback", e);
                None
            }
        }
    }

    async fn ab_variant_terms(&self, entity: &EntityRef) -> Option<TermMap> {
        let assignment = match self.repo.get_ab_assignment(entity).await {
            Ok(Some(assignment)) => assignment,
            Ok(None) => return None,
            Err(e) => {
                warn!("A/B assignment lookup failed for {}: {}", entity, e);
                return None;
            }
        };

        match self
            .repo
            .get_ab_variant_terms(&assignment.test_id, &assignment.variant)
            .await
        {
            Ok(Some(terms)) => {
                debug!(
                    "Using A/B variant {}/{} for {}",
                    assignment.test_id, assignment.variant, entity
                );
                Some(terms)
            }
            Ok(None) => {
                warn!(
                    "A/B variant {}/{} for {} has no terms, using inheritance",
                    assignment.test_id, assignment.variant, entity
                );
                None
            }
            Err(e) => {
                warn!(
                    "Failed to load A/B variant {}/{} for {}: {}",
                    assignment.test_id, assignment.variant, entity, e
                );
                None
            }
        }
    }

    /// Store terminology records for one entity
    ///
    /// All records are written in one repository call, or none are.
    pub async fn save_terminology(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        records: &[TerminologyRecord],
    ) -> bool {
        let entity = entity_ref(entity_type, entity_id);
        match self.try_save(&entity, records).await {
            Ok(count) => {
                info!("Saved {} terminology entries for {}", count, entity);
                self.invalidate_entity(&entity).await;
                true
            }
            Err(e) => {
                error!("Failed to save terminology for {}: {}", entity, e);
                false
            }
        }
    }

    async fn try_save(&self, entity: &EntityRef, records: &[TerminologyRecord]) -> Result<usize> {
        let entries = records
            .iter()
            .map(|record| -> Result<TerminologyEntry> {
                validate_key(&record.key)?;
                Ok(TerminologyEntry {
                    key: record.key.clone(),
                    value: record.value.clone(),
                    override_behavior: record.override_behavior.unwrap_or_default(),
                    entity_id: entity.id.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if entries.is_empty() {
            return Ok(0);
        }

        // The stored level must still unflatten once the new entries land
        let mut combined = self.repo.get_entries(entity).await?;
        combined.retain(|existing| !entries.iter().any(|new| new.key == existing.key));
        combined.extend(entries.iter().cloned());
        entries_to_layer(&combined)?;

        self.repo.insert_entries(entity, &entries).await?;
        Ok(entries.len())
    }

    /// Delete every entry under one category (key prefix)
    pub async fn delete_terminology_for_category(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        category: &str,
    ) -> bool {
        let entity = entity_ref(entity_type, entity_id);
        let result = match validate_key(category) {
            Ok(()) => self.repo.delete_entries_by_prefix(&entity, category).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(removed) => {
                info!("Deleted {} terminology entries under '{}' for {}", removed, category, entity);
                self.invalidate_entity(&entity).await;
                true
            }
            Err(e) => {
                error!("Failed to delete terminology category '{}' for {}: {}", category, entity, e);
                false
            }
        }
    }

    /// Delete all of one entity's terminology
    pub async fn delete_entity_terminology(&self, entity_type: EntityType, entity_id: &str) -> bool {
        let entity = entity_ref(entity_type, entity_id);
        match self.repo.delete_all_entries(&entity).await {
            Ok(removed) => {
                info!("Deleted all {} terminology entries for {}", removed, entity);
                self.invalidate_entity(&entity).await;
                true
            }
            Err(e) => {
                error!("Failed to delete terminology for {}: {}", entity, e);
                false
            }
        }
    }

    /// Replace an entity's entries with a predefined template
    pub async fn apply_predefined_terminology(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        template_key: &str,
    ) -> bool {
        let entity = entity_ref(entity_type, entity_id);
        let Some(template) = templates::get_template(template_key) else {
            warn!("Unknown terminology template '{}' requested for {}", template_key, entity);
            return false;
        };

        let entries: Vec<TerminologyEntry> = flatten(&template.terms)
            .into_iter()
            .map(|(key, value)| TerminologyEntry {
                key,
                value,
                override_behavior: OverrideBehavior::Replace,
                entity_id: entity.id.clone(),
            })
            .collect();

        match self.repo.replace_entries(&entity, &entries).await {
            Ok(()) => {
                info!("Applied template '{}' ({} entries) to {}", template.key, entries.len(), entity);
                self.invalidate_entity(&entity).await;
                true
            }
            Err(e) => {
                error!("Failed to apply template '{}' to {}: {}", template.key, entity, e);
                false
            }
        }
    }

    /// Drop cached resolutions after an entity's parent links changed
    ///
    /// Descendants keep their cached maps until they expire.
    pub async fn notify_ownership_changed(&self, entity_type: EntityType, entity_id: &str) {
        let entity = entity_ref(entity_type, entity_id);
        info!("Ownership changed for {}, invalidating cached terminology", entity);
        self.invalidate_entity(&entity).await;
    }

    /// Clear cached resolutions: everything, one type, or one entity
    pub async fn clear_cache(&self, entity_type: Option<EntityType>, entity_id: Option<&str>) -> usize {
        self.cache.invalidate(entity_type, entity_id).await
    }

    pub fn list_templates(&self) -> Vec<&'static TerminologyTemplate> {
        templates::list_templates()
    }

    async fn invalidate_entity(&self, entity: &EntityRef) {
        if entity.entity_type == EntityType::System {
            // Covers the separately cached defaults as well
            self.cache.invalidate(Some(EntityType::System), None).await;
        } else {
            self.cache
                .invalidate(Some(entity.entity_type), Some(&entity.id))
                .await;
        }
    }
}

/// System terminology always lives under one fixed id
fn entity_ref(entity_type: EntityType, entity_id: &str) -> EntityRef {
    match entity_type {
        EntityType::System => EntityRef::new(EntityType::System, SYSTEM_ENTITY_ID),
        other => EntityRef::new(other, entity_id),
    }
}

/// Keep only the subtrees at the requested key paths
fn select_keys(resolved: &TermMap, keys: &[String]) -> TermMap {
    let mut sorted: Vec<&str> = keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut selected = TermMap::new();
    let mut taken: Vec<&str> = Vec::new();
    for key in sorted {
        if taken.iter().any(|prefix| key_has_prefix(key, prefix)) {
            continue;
        }
        if let Some(value) = get_path(resolved, key) {
            if let Err(e) = set_path(&mut selected, key, value.clone()) {
                debug!("Skipping requested key '{}': {}", key, e);
                continue;
            }
            taken.push(key);
        }
    }
    selected
}

impl std::fmt::Debug for TerminologyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminologyEngine")
            .field("cache_ttl", &self.cache.ttl())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::term_map_from_json;
    use serde_json::json;

    #[test]
    fn test_select_keys_returns_requested_subtrees() {
        let resolved = term_map_from_json(json!({
            "journeyTerms": {"mainUnit": {"singular": "quest"}},
            "stepTerms": {"mainUnit": {"singular": "step"}},
            "toolTerms": {"library": "Toolbox"}
        }))
        .unwrap();

        let keys = vec![
            "toolTerms".to_string(),
            "journeyTerms.mainUnit.singular".to_string(),
            "journeyTerms.mainUnit".to_string(),
            "missing.key".to_string(),
        ];
        let selected = select_keys(&resolved, &keys);
        assert_eq!(
            selected,
            term_map_from_json(json!({
                "journeyTerms": {"mainUnit": {"singular": "quest"}},
                "toolTerms": {"library": "Toolbox"}
            }))
            .unwrap()
        );
    }

    #[test]
    fn test_system_entity_id_is_normalised() {
        assert_eq!(entity_ref(EntityType::System, "anything"), EntityRef::system());
        assert_eq!(entity_ref(EntityType::Team, "T1").to_string(), "team:T1");
    }
}
